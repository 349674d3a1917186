//! JSON-RPC backed ledger client

use super::{LedgerClient, LedgerError, LedgerResult};
use crate::types::{Checkpoint, Finality, SignatureStatus};
use async_trait::async_trait;
use solana_client::{
    client_error::ClientError, nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig,
};
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature, transaction::Transaction};
use solana_transaction_status::TransactionConfirmationStatus;
use std::sync::Arc;
use tracing::debug;

/// Ledger client over a shared nonblocking `RpcClient`.
///
/// The client is cheap to clone and holds no per-transaction state, so any
/// number of submissions can poll through it concurrently.
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    skip_preflight: bool,
}

impl RpcLedger {
    pub fn new(rpc_url: String, finality: Finality) -> Self {
        let commitment = finality.commitment();
        Self::from_client(Arc::new(RpcClient::new_with_commitment(rpc_url, commitment)), commitment)
    }

    pub fn from_client(client: Arc<RpcClient>, commitment: CommitmentConfig) -> Self {
        Self {
            client,
            commitment,
            skip_preflight: false,
        }
    }

    /// Skip the node's simulation before accepting a transaction
    pub fn with_skip_preflight(mut self, skip_preflight: bool) -> Self {
        self.skip_preflight = skip_preflight;
        self
    }

    /// Get the RPC client
    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }
}

/// Preflight failures carry a transaction error; everything else is transport
fn classify(err: &ClientError) -> LedgerError {
    match err.get_transaction_error() {
        Some(tx_err) => LedgerError::Rejected(tx_err.to_string()),
        None => LedgerError::Transport(err.to_string()),
    }
}

fn transport(err: &ClientError) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: self.skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };

        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| classify(&e))
    }

    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| transport(&e))?;

        let Some(status) = response.value.into_iter().next().flatten() else {
            return Ok(None);
        };

        let finality = match status.confirmation_status() {
            TransactionConfirmationStatus::Processed => Finality::Processed,
            TransactionConfirmationStatus::Confirmed => Finality::Confirmed,
            TransactionConfirmationStatus::Finalized => Finality::Finalized,
        };
        debug!("Signature {} at slot {} is {}", signature, status.slot, finality);

        Ok(Some(SignatureStatus {
            slot: status.slot,
            finality,
            error: status.err.map(|e| e.to_string()),
        }))
    }

    async fn get_recent_checkpoint(&self) -> LedgerResult<Checkpoint> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| transport(&e))?;
        let block_height = self
            .client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| transport(&e))?;

        Ok(Checkpoint {
            blockhash,
            last_valid_block_height,
            block_height,
        })
    }
}
