//! In-memory cluster
//!
//! Simulates just enough of a ledger to exercise the submission engine: a
//! block height that advances as the cluster is queried, blockhashes with a
//! bounded validity window, deduplication by signature, depth-based
//! confirmation and atomic execution of registered programs.

use super::{LedgerClient, LedgerError, LedgerResult};
use crate::types::{Checkpoint, Finality, SignatureStatus};
use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use std::{
    collections::HashMap,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Account contents owned by a simulated program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

pub type AccountStore = HashMap<Pubkey, StoredAccount>;

/// Executes one program's instructions against the account store.
///
/// Errors abort the whole transaction; the store is only committed when
/// every instruction succeeds.
pub trait ProgramProcessor: Send + Sync {
    fn process(&self, instruction: &Instruction, accounts: &mut AccountStore) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy)]
pub struct LocalLedgerConfig {
    /// Blocks a blockhash stays usable after it was issued
    pub blockhash_validity: u64,

    /// Depth at which a landed transaction counts as confirmed
    pub confirmation_depth: u64,

    /// Depth at which a landed transaction counts as finalized
    pub finalization_depth: u64,

    /// Blocks produced per status query
    pub blocks_per_query: u64,

    /// Reject failing transactions at send time instead of landing them
    pub preflight: bool,
}

impl Default for LocalLedgerConfig {
    fn default() -> Self {
        Self {
            blockhash_validity: 150,
            confirmation_depth: 1,
            finalization_depth: 4,
            blocks_per_query: 1,
            preflight: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Landed {
    slot: u64,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct LedgerState {
    block_height: u64,
    latest_blockhash: Hash,
    blockhashes: HashMap<Hash, u64>,
    landed: HashMap<Signature, Landed>,
    accounts: AccountStore,
    fail_sends: u32,
    fail_queries: u32,
    drop_sends: u32,
    sends: u64,
    executions: u64,
}

impl LedgerState {
    fn produce_blocks(&mut self, blocks: u64) {
        for _ in 0..blocks {
            self.block_height += 1;
            self.latest_blockhash = Hash::new_unique();
            self.blockhashes.insert(self.latest_blockhash, self.block_height);
        }
    }
}

/// In-memory [`LedgerClient`]
pub struct LocalLedger {
    config: LocalLedgerConfig,
    processors: HashMap<Pubkey, Arc<dyn ProgramProcessor>>,
    state: Mutex<LedgerState>,
}

impl LocalLedger {
    pub fn new(config: LocalLedgerConfig) -> Self {
        let mut state = LedgerState::default();
        state.produce_blocks(1);

        Self {
            config,
            processors: HashMap::new(),
            state: Mutex::new(state),
        }
    }

    /// Register the program that executes instructions for `program_id`
    pub fn with_processor(mut self, program_id: Pubkey, processor: impl ProgramProcessor + 'static) -> Self {
        self.processors.insert(program_id, Arc::new(processor));
        self
    }

    pub fn config(&self) -> &LocalLedgerConfig {
        &self.config
    }

    /// Produce `blocks` empty blocks
    pub async fn advance(&self, blocks: u64) {
        self.state.lock().await.produce_blocks(blocks);
    }

    pub async fn block_height(&self) -> u64 {
        self.state.lock().await.block_height
    }

    pub async fn account(&self, address: &Pubkey) -> Option<StoredAccount> {
        self.state.lock().await.accounts.get(address).cloned()
    }

    /// Seed an account outside of any transaction
    pub async fn set_account(&self, address: Pubkey, account: StoredAccount) {
        self.state.lock().await.accounts.insert(address, account);
    }

    /// Fail the next `count` sends with a transport error
    pub async fn fail_next_sends(&self, count: u32) {
        self.state.lock().await.fail_sends = count;
    }

    /// Fail the next `count` status or checkpoint queries with a transport error
    pub async fn fail_next_queries(&self, count: u32) {
        self.state.lock().await.fail_queries = count;
    }

    /// Accept the next `count` sends without ever landing them
    pub async fn drop_next_sends(&self, count: u32) {
        self.state.lock().await.drop_sends = count;
    }

    /// Number of send requests received, including duplicates
    pub async fn sends(&self) -> u64 {
        self.state.lock().await.sends
    }

    /// Number of transactions actually executed
    pub async fn executions(&self) -> u64 {
        self.state.lock().await.executions
    }

    fn execute(&self, message: &Message, accounts: &AccountStore) -> Result<AccountStore, String> {
        let mut scratch = accounts.clone();
        for (index, instruction) in decompile(message).iter().enumerate() {
            if let Some(processor) = self.processors.get(&instruction.program_id) {
                processor
                    .process(instruction, &mut scratch)
                    .map_err(|e| format!("Error processing Instruction {index}: {e}"))?;
            }
        }
        Ok(scratch)
    }
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new(LocalLedgerConfig::default())
    }
}

/// Expand compiled instructions back into program id + account metas
fn decompile(message: &Message) -> Vec<Instruction> {
    let header = &message.header;
    let signed = usize::from(header.num_required_signatures);
    let readonly_signed = usize::from(header.num_readonly_signed_accounts);
    let readonly_unsigned = usize::from(header.num_readonly_unsigned_accounts);
    let total = message.account_keys.len();

    let is_writable = |i: usize| {
        if i < signed {
            i < signed - readonly_signed
        } else {
            i < total - readonly_unsigned
        }
    };

    message
        .instructions
        .iter()
        .map(|compiled| Instruction {
            program_id: message.account_keys[usize::from(compiled.program_id_index)],
            accounts: compiled
                .accounts
                .iter()
                .map(|&index| {
                    let i = usize::from(index);
                    AccountMeta {
                        pubkey: message.account_keys[i],
                        is_signer: i < signed,
                        is_writable: is_writable(i),
                    }
                })
                .collect(),
            data: compiled.data.clone(),
        })
        .collect()
}

#[async_trait]
impl LedgerClient for LocalLedger {
    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let mut state = self.state.lock().await;
        state.sends += 1;

        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return Err(LedgerError::Transport("connection refused".to_string()));
        }

        let signature = *transaction
            .signatures
            .first()
            .ok_or_else(|| LedgerError::Rejected("transaction has no signatures".to_string()))?;
        transaction
            .verify()
            .map_err(|e| LedgerError::Rejected(e.to_string()))?;

        if state.landed.contains_key(&signature) {
            debug!("Duplicate transaction {}", signature);
            return Ok(signature);
        }

        if state.drop_sends > 0 {
            state.drop_sends -= 1;
            debug!("Dropping transaction {}", signature);
            return Ok(signature);
        }

        let recent = transaction.message.recent_blockhash;
        let usable = state
            .blockhashes
            .get(&recent)
            .is_some_and(|issued| state.block_height <= issued + self.config.blockhash_validity);
        if !usable {
            // Nodes silently drop transactions built against unknown hashes.
            debug!("Transaction {} references a stale blockhash", signature);
            return Ok(signature);
        }

        let outcome = self.execute(&transaction.message, &state.accounts);
        let error = match outcome {
            Ok(accounts) => {
                state.accounts = accounts;
                None
            }
            Err(e) if self.config.preflight => return Err(LedgerError::Rejected(e)),
            Err(e) => Some(e),
        };

        state.executions += 1;
        let slot = state.block_height;
        info!("Transaction {} landed in slot {} (error: {:?})", signature, slot, error);
        state.landed.insert(signature, Landed { slot, error });

        Ok(signature)
    }

    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        let mut state = self.state.lock().await;
        if state.fail_queries > 0 {
            state.fail_queries -= 1;
            return Err(LedgerError::Transport("status query timed out".to_string()));
        }

        state.produce_blocks(self.config.blocks_per_query);

        Ok(state.landed.get(signature).map(|landed| {
            let depth = state.block_height.saturating_sub(landed.slot);
            let finality = if depth >= self.config.finalization_depth {
                Finality::Finalized
            } else if depth >= self.config.confirmation_depth {
                Finality::Confirmed
            } else {
                Finality::Processed
            };

            SignatureStatus {
                slot: landed.slot,
                finality,
                error: landed.error.clone(),
            }
        }))
    }

    async fn get_recent_checkpoint(&self) -> LedgerResult<Checkpoint> {
        let mut state = self.state.lock().await;
        if state.fail_queries > 0 {
            state.fail_queries -= 1;
            return Err(LedgerError::Transport("checkpoint query timed out".to_string()));
        }

        let issued = state.blockhashes.get(&state.latest_blockhash).copied().unwrap_or_default();
        Ok(Checkpoint {
            blockhash: state.latest_blockhash,
            last_valid_block_height: issued + self.config.blockhash_validity,
            block_height: state.block_height,
        })
    }
}
