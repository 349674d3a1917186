//! Common types for hotel-runtime

use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, hash::Hash, signature::Signature};
use std::{fmt, str::FromStr};

/// Durability level of a landed transaction, ordered by strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Finality {
    Processed,
    Confirmed,
    Finalized,
}

impl Finality {
    pub fn commitment(self) -> CommitmentConfig {
        match self {
            Finality::Processed => CommitmentConfig::processed(),
            Finality::Confirmed => CommitmentConfig::confirmed(),
            Finality::Finalized => CommitmentConfig::finalized(),
        }
    }
}

impl fmt::Display for Finality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finality::Processed => write!(f, "processed"),
            Finality::Confirmed => write!(f, "confirmed"),
            Finality::Finalized => write!(f, "finalized"),
        }
    }
}

impl FromStr for Finality {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Finality::Processed),
            "confirmed" => Ok(Finality::Confirmed),
            "finalized" => Ok(Finality::Finalized),
            other => Err(RuntimeError::InvalidConfiguration(format!(
                "unknown commitment level `{other}`"
            ))),
        }
    }
}

/// Recent ledger checkpoint a transaction is built against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Recent blockhash
    pub blockhash: Hash,

    /// Last block height at which the blockhash is still accepted
    pub last_valid_block_height: u64,

    /// Block height observed when the checkpoint was fetched
    pub block_height: u64,
}

impl Checkpoint {
    pub fn is_present(&self) -> bool {
        self.blockhash != Hash::default()
    }

    /// Whether the ledger has advanced past this checkpoint's validity window
    pub fn expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

/// Status of a signature as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub finality: Finality,
    /// Execution error, if the transaction landed but reverted
    pub error: Option<String>,
}

/// Local view of a submission's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Processed,
    Confirmed,
    Finalized,
    Failed(String),
    Expired,
}

impl SubmissionStatus {
    pub fn finality(&self) -> Option<Finality> {
        match self {
            SubmissionStatus::Processed => Some(Finality::Processed),
            SubmissionStatus::Confirmed => Some(Finality::Confirmed),
            SubmissionStatus::Finalized => Some(Finality::Finalized),
            _ => None,
        }
    }

    /// Whether the status satisfies a wait for `target`
    pub fn reaches(&self, target: Finality) -> bool {
        self.finality().is_some_and(|finality| finality >= target)
    }

    fn rank(&self) -> u8 {
        match self {
            SubmissionStatus::Pending => 0,
            SubmissionStatus::Processed => 1,
            SubmissionStatus::Confirmed => 2,
            SubmissionStatus::Finalized | SubmissionStatus::Failed(_) | SubmissionStatus::Expired => 3,
        }
    }

    /// Whether moving to `next` keeps the lifecycle monotonic
    pub fn can_advance_to(&self, next: &SubmissionStatus) -> bool {
        if matches!(self, SubmissionStatus::Failed(_) | SubmissionStatus::Expired) {
            return false;
        }
        // A confirmed transaction can only become finalized.
        if *self == SubmissionStatus::Confirmed {
            return *next == SubmissionStatus::Finalized;
        }
        next.rank() > self.rank()
    }
}

impl From<Finality> for SubmissionStatus {
    fn from(finality: Finality) -> Self {
        match finality {
            Finality::Processed => SubmissionStatus::Processed,
            Finality::Confirmed => SubmissionStatus::Confirmed,
            Finality::Finalized => SubmissionStatus::Finalized,
        }
    }
}

/// Outcome of waiting on a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The transaction reached at least the requested finality
    Reached { signature: Signature, finality: Finality },

    /// The transaction landed (or was rejected) with an execution error
    Failed { signature: Signature, reason: String },

    /// The checkpoint expired before the transaction landed
    Expired { signature: Signature },

    /// The wait elapsed; the submission may still land later
    Timeout { signature: Signature, last_seen: SubmissionStatus },

    /// The ledger could not be reached while waiting
    NetworkError { signature: Signature, message: String },
}

impl TerminalStatus {
    pub fn signature(&self) -> &Signature {
        match self {
            TerminalStatus::Reached { signature, .. }
            | TerminalStatus::Failed { signature, .. }
            | TerminalStatus::Expired { signature }
            | TerminalStatus::Timeout { signature, .. }
            | TerminalStatus::NetworkError { signature, .. } => signature,
        }
    }
}
