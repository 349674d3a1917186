//! Ledger collaborator
//!
//! The submission engine only talks to the cluster through [`LedgerClient`].
//! [`RpcLedger`] backs it with a JSON-RPC node; [`LocalLedger`] is an
//! in-memory cluster used by tests and the harness's `local` mode.

pub mod local;
pub mod rpc;

pub use local::{AccountStore, LocalLedger, LocalLedgerConfig, ProgramProcessor, StoredAccount};
pub use rpc::RpcLedger;

use crate::types::{Checkpoint, SignatureStatus};
use async_trait::async_trait;
use solana_sdk::{signature::Signature, transaction::Transaction};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The cluster could not be reached or answered garbage
    #[error("transport error: {0}")]
    Transport(String),

    /// The cluster refused the transaction at send time
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// The three primitives the client core needs from a cluster
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Send a signed transaction once; the ledger deduplicates by signature
    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature>;

    /// Current status of a signature, `None` if the ledger has not seen it land
    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>>;

    /// Recent blockhash with its validity window and the current block height
    async fn get_recent_checkpoint(&self) -> LedgerResult<Checkpoint>;
}

#[async_trait]
impl<L: LedgerClient + ?Sized> LedgerClient for Arc<L> {
    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        (**self).send_transaction(transaction).await
    }

    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        (**self).get_signature_status(signature).await
    }

    async fn get_recent_checkpoint(&self) -> LedgerResult<Checkpoint> {
        (**self).get_recent_checkpoint().await
    }
}
