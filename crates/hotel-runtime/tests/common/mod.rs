#![allow(dead_code)]

use hotel_runtime::{
    descriptor::Descriptor,
    ledger::{AccountStore, ProgramProcessor, StoredAccount},
    program::{self, initialize_accounts, initialize_args, HotelOperation},
    transaction::{sign, SignedEnvelope, TransactionAssembler},
    HotelProgram, LedgerClient, LocalLedger, LocalLedgerConfig, ProgramClient, Result, RuntimeConfig,
    HOTEL_PROGRAM_ID,
};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
};
use std::{sync::Arc, time::Duration};

pub const ROOM_COUNT: u64 = 4;
pub const TRANSFER_FEE_BPS: u16 = 50;

/// Runtime config tuned for the in-memory ledger
pub fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        poll_interval: Duration::from_millis(1),
        confirm_timeout: Duration::from_secs(5),
        ..RuntimeConfig::default()
    }
}

pub struct TestContext {
    pub ledger: Arc<LocalLedger>,
    pub client: ProgramClient<LocalLedger, HotelOperation>,
    pub authority: Arc<Keypair>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with(LocalLedgerConfig::default(), fast_config())
    }

    pub fn with(ledger_config: LocalLedgerConfig, config: RuntimeConfig) -> Self {
        let ledger = Arc::new(LocalLedger::new(ledger_config).with_processor(HOTEL_PROGRAM_ID, HotelProgram));
        let descriptor = Arc::new(program::descriptor().unwrap());
        let authority = Arc::new(Keypair::new());
        let client = ProgramClient::new(descriptor, ledger.clone(), authority.clone(), config);

        Self {
            ledger,
            client,
            authority,
        }
    }

    /// Invoke `initialize` for `hotel` with a fresh room mint
    pub async fn initialize_hotel(&self, hotel: &Keypair) -> Result<Signature> {
        self.initialize_hotel_with_mint(hotel, &Keypair::new()).await
    }

    pub async fn initialize_hotel_with_mint(&self, hotel: &Keypair, room_mint: &Keypair) -> Result<Signature> {
        self.client
            .invoke(
                HotelOperation::Initialize,
                &initialize_args(ROOM_COUNT, TRANSFER_FEE_BPS),
                &initialize_accounts(hotel.pubkey(), self.authority.pubkey(), room_mint.pubkey()),
                &[hotel, room_mint],
            )
            .await
    }
}

/// A signed lamport transfer against the ledger's current checkpoint
pub async fn transfer_envelope(ledger: &LocalLedger, payer: &Keypair) -> SignedEnvelope {
    let checkpoint = ledger.get_recent_checkpoint().await.unwrap();
    let unsigned = TransactionAssembler::new(payer.pubkey())
        .add_instruction(system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1))
        .assemble(checkpoint, "transfer")
        .unwrap();
    sign(unsigned, &[payer]).unwrap()
}

// ================================
// Scaffold program
// ================================

/// Interface of a freshly scaffolded program: `initialize` takes no arguments
pub const SCAFFOLD_IDL: &str = r#"{
    "address": "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS",
    "metadata": { "name": "scaffold", "version": "0.1.0" },
    "instructions": [{
        "name": "initialize",
        "accounts": [
            { "name": "state", "writable": true },
            { "name": "payer", "writable": true, "signer": true }
        ],
        "args": []
    }]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaffoldOperation {
    Initialize,
}

impl hotel_runtime::Operation for ScaffoldOperation {
    const ALL: &'static [Self] = &[ScaffoldOperation::Initialize];

    fn name(self) -> &'static str {
        "initialize"
    }
}

/// Marks its `state` account initialized, once
pub struct ScaffoldProgram;

impl ProgramProcessor for ScaffoldProgram {
    fn process(&self, instruction: &Instruction, accounts: &mut AccountStore) -> std::result::Result<(), String> {
        let state = instruction
            .accounts
            .first()
            .ok_or_else(|| "insufficient account keys for instruction".to_string())?
            .pubkey;

        if accounts.contains_key(&state) {
            return Err(format!("account {state} already initialized"));
        }
        accounts.insert(
            state,
            StoredAccount {
                owner: instruction.program_id,
                data: vec![1],
            },
        );
        Ok(())
    }
}

pub fn scaffold_client(ledger_config: LocalLedgerConfig) -> (Arc<LocalLedger>, ProgramClient<LocalLedger, ScaffoldOperation>) {
    let descriptor: Descriptor<ScaffoldOperation> = Descriptor::from_json(SCAFFOLD_IDL).unwrap();
    let ledger = Arc::new(LocalLedger::new(ledger_config).with_processor(descriptor.program_id(), ScaffoldProgram));
    let client = ProgramClient::new(Arc::new(descriptor), ledger.clone(), Arc::new(Keypair::new()), fast_config());
    (ledger, client)
}
