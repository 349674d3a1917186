//! Transaction assembly and signing

use crate::{types::Checkpoint, Result, RuntimeError};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    signer::Signer,
    transaction::Transaction,
};
use tracing::{debug, info};

/// Transaction metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Transaction description
    pub description: String,

    /// Compute unit limit, if one was requested
    pub compute_units: Option<u32>,

    /// Priority fee (micro-lamports per compute unit)
    pub priority_fee: Option<u64>,
}

/// Assembled transaction waiting for signatures
#[derive(Debug, Clone)]
pub struct UnsignedEnvelope {
    /// Compiled message
    pub message: Message,

    /// Checkpoint the message was built against
    pub checkpoint: Checkpoint,

    /// Required signers, fee payer first
    pub signers: Vec<Pubkey>,

    /// Transaction metadata
    pub metadata: TransactionMetadata,
}

/// Fully signed transaction, immutable from here on
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    transaction: Transaction,
    checkpoint: Checkpoint,
    metadata: TransactionMetadata,
}

impl SignedEnvelope {
    /// Transaction signature (the fee payer's signature)
    pub fn signature(&self) -> Signature {
        self.transaction.signatures[0]
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn metadata(&self) -> &TransactionMetadata {
        &self.metadata
    }

    /// Wire encoding of the signed transaction
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.transaction)?)
    }
}

/// Collects instructions and compiles them into an [`UnsignedEnvelope`]
pub struct TransactionAssembler {
    fee_payer: Pubkey,
    instructions: Vec<Instruction>,
    compute_units: Option<u32>,
    priority_fee: Option<u64>,
}

impl TransactionAssembler {
    /// Create a new assembler paid for by `fee_payer`
    pub fn new(fee_payer: Pubkey) -> Self {
        Self {
            fee_payer,
            instructions: Vec::new(),
            compute_units: None,
            priority_fee: None,
        }
    }

    /// Add an instruction to the transaction
    pub fn add_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Add multiple instructions
    pub fn add_instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Set compute unit limit
    pub fn with_compute_units(mut self, units: Option<u32>) -> Self {
        self.compute_units = units;
        self
    }

    /// Set priority fee
    pub fn with_priority_fee(mut self, fee: Option<u64>) -> Self {
        self.priority_fee = fee;
        self
    }

    /// Compile the message against `checkpoint`
    pub fn assemble(self, checkpoint: Checkpoint, description: impl Into<String>) -> Result<UnsignedEnvelope> {
        let description = description.into();
        info!("Assembling transaction: {}", description);

        if self.instructions.is_empty() {
            return Err(RuntimeError::EmptyInstructionSet);
        }
        if !checkpoint.is_present() {
            return Err(RuntimeError::MissingCheckpoint);
        }

        let mut instructions = Vec::with_capacity(self.instructions.len() + 2);
        if let Some(fee) = self.priority_fee {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(fee));
        }
        if let Some(units) = self.compute_units {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(units));
        }
        instructions.extend(self.instructions);

        let message = Message::new_with_blockhash(&instructions, Some(&self.fee_payer), &checkpoint.blockhash);
        let required = usize::from(message.header.num_required_signatures);
        let signers = message.account_keys[..required].to_vec();

        debug!(
            "Compiled message with {} instructions and {} required signers",
            message.instructions.len(),
            signers.len()
        );

        Ok(UnsignedEnvelope {
            message,
            checkpoint,
            signers,
            metadata: TransactionMetadata {
                description,
                compute_units: self.compute_units,
                priority_fee: self.priority_fee,
            },
        })
    }

    /// One-shot assembly of `instructions` for `fee_payer`
    pub fn assemble_instructions(
        instructions: Vec<Instruction>,
        fee_payer: Pubkey,
        checkpoint: Checkpoint,
    ) -> Result<UnsignedEnvelope> {
        Self::new(fee_payer)
            .add_instructions(instructions)
            .assemble(checkpoint, "transaction")
    }
}

/// Sign an envelope with every required signer.
///
/// Keys that the message does not require are ignored; duplicates collapse.
/// Signing is local and never touches the network.
pub fn sign(unsigned: UnsignedEnvelope, signers: &[&dyn Signer]) -> Result<SignedEnvelope> {
    let mut ordered: Vec<&dyn Signer> = Vec::with_capacity(unsigned.signers.len());
    for required in &unsigned.signers {
        let signer = signers
            .iter()
            .copied()
            .find(|s| s.pubkey() == *required)
            .ok_or(RuntimeError::MissingSigner(*required))?;
        ordered.push(signer);
    }

    let mut transaction = Transaction::new_unsigned(unsigned.message);
    transaction
        .try_sign(ordered.as_slice(), unsigned.checkpoint.blockhash)
        .map_err(|e| RuntimeError::Signing(e.to_string()))?;

    debug!("Signed transaction {}", transaction.signatures[0]);

    Ok(SignedEnvelope {
        transaction,
        checkpoint: unsigned.checkpoint,
        metadata: unsigned.metadata,
    })
}
