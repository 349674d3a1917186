//! Core runtime types: configuration and error handling

use crate::{descriptor::DescriptorError, types::Finality};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::{env, time::Duration};
use thiserror::Error;

// ================================
// Configuration Types
// ================================

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// RPC endpoint URL
    pub rpc_url: String,

    /// Finality a call waits for before it reports success
    pub target_finality: Finality,

    /// Delay between two status polls of the same submission
    pub poll_interval: Duration,

    /// Upper bound on a single confirmation wait
    pub confirm_timeout: Duration,

    /// Rebroadcast the pending transaction every N polls
    pub rebroadcast_every: u32,

    /// Maximum rebroadcasts of identical signed bytes per submission
    pub max_rebroadcasts: u32,

    /// Resubmission policy for expired transactions
    pub retry: RetryPolicy,

    /// Optional compute unit limit attached to every transaction
    pub compute_units: Option<u32>,

    /// Optional priority fee (micro-lamports per compute unit)
    pub priority_fee: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8899".to_string(),
            target_finality: Finality::Confirmed,
            poll_interval: Duration::from_millis(500),
            confirm_timeout: Duration::from_secs(60),
            rebroadcast_every: 4,
            max_rebroadcasts: 3,
            retry: RetryPolicy::default(),
            compute_units: None,
            priority_fee: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let target_finality = match env::var("HOTEL_COMMITMENT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.target_finality,
        };

        Ok(Self {
            rpc_url: env::var("HOTEL_RPC_URL").unwrap_or(defaults.rpc_url),
            target_finality,
            poll_interval: Duration::from_millis(env_number(
                "HOTEL_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            confirm_timeout: Duration::from_secs(env_number(
                "HOTEL_CONFIRM_TIMEOUT_SECS",
                defaults.confirm_timeout.as_secs(),
            )?),
            rebroadcast_every: env_number("HOTEL_REBROADCAST_EVERY", defaults.rebroadcast_every)?,
            max_rebroadcasts: env_number("HOTEL_MAX_REBROADCASTS", defaults.max_rebroadcasts)?,
            retry: RetryPolicy {
                resubmit_on_expiry: env_number(
                    "HOTEL_RESUBMIT_ON_EXPIRY",
                    defaults.retry.resubmit_on_expiry,
                )?,
                max_resubmits: env_number("HOTEL_MAX_RESUBMITS", defaults.retry.max_resubmits)?,
            },
            compute_units: env_optional("HOTEL_COMPUTE_UNITS")?,
            priority_fee: env_optional("HOTEL_PRIORITY_FEE")?,
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RuntimeError::InvalidConfiguration(format!("{key}={raw}"))),
        Err(_) => Ok(default),
    }
}

fn env_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RuntimeError::InvalidConfiguration(format!("{key}={raw}"))),
        Err(_) => Ok(None),
    }
}

/// Resubmission policy for expired transactions.
///
/// Resubmitting re-signs the instructions against a fresh checkpoint, which
/// yields a new signature for the same logical call. It is off unless the
/// caller opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub resubmit_on_expiry: bool,
    pub max_resubmits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            resubmit_on_expiry: false,
            max_resubmits: 2,
        }
    }
}

impl RetryPolicy {
    /// Whether another resubmission is allowed after `attempts` resubmissions
    pub fn allows(&self, attempts: u32) -> bool {
        self.resubmit_on_expiry && attempts < self.max_resubmits
    }
}

// ================================
// Error Types
// ================================

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Argument mismatch for `{operation}`: {reason}")]
    ArgumentMismatch { operation: String, reason: String },

    #[error("Account constraint violated for `{operation}`: {reason}")]
    AccountConstraintViolation { operation: String, reason: String },

    #[error("Transaction has no instructions")]
    EmptyInstructionSet,

    #[error("No recent checkpoint supplied")]
    MissingCheckpoint,

    #[error("Missing signer for {0}")]
    MissingSigner(Pubkey),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transaction {signature} expired before it was confirmed")]
    Expired { signature: Signature },

    #[error("Transaction {signature} failed: {reason}")]
    Failed { signature: Signature, reason: String },

    #[error("Timed out waiting for transaction {signature}")]
    Timeout { signature: Signature },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<bincode::Error> for RuntimeError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.target_finality, Finality::Confirmed);
        assert!(!config.retry.resubmit_on_expiry);
        assert!(config.max_rebroadcasts > 0);
    }

    #[test]
    fn test_retry_policy_is_bounded() {
        let policy = RetryPolicy {
            resubmit_on_expiry: true,
            max_resubmits: 2,
        };
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));

        assert!(!RetryPolicy::default().allows(0));
    }

    #[test]
    fn test_env_number_falls_back_to_default() {
        let value = env_number::<u32>("HOTEL_TEST_UNSET_KEY", 7).unwrap();
        assert_eq!(value, 7);
    }
}
