//! Maps a submission's terminal status onto the caller's `Result`

use crate::{types::TerminalStatus, Result, RuntimeError};
use solana_sdk::signature::Signature;
use tracing::debug;

/// Success carries the transaction signature; everything else is a typed error
pub fn resolve(status: TerminalStatus) -> Result<Signature> {
    match status {
        TerminalStatus::Reached { signature, finality } => {
            debug!("Transaction {} reached {}", signature, finality);
            Ok(signature)
        }
        TerminalStatus::Failed { signature, reason } => Err(RuntimeError::Failed { signature, reason }),
        TerminalStatus::Expired { signature } => Err(RuntimeError::Expired { signature }),
        TerminalStatus::Timeout { signature, .. } => Err(RuntimeError::Timeout { signature }),
        TerminalStatus::NetworkError { message, .. } => Err(RuntimeError::Network(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Finality, SubmissionStatus};

    #[test]
    fn test_resolve() {
        let signature = Signature::new_unique();

        let ok = resolve(TerminalStatus::Reached {
            signature,
            finality: Finality::Finalized,
        });
        assert_eq!(ok.unwrap(), signature);

        let failed = resolve(TerminalStatus::Failed {
            signature,
            reason: "custom program error: 0x1771".to_string(),
        });
        assert!(matches!(failed, Err(RuntimeError::Failed { reason, .. }) if reason.ends_with("0x1771")));

        assert!(matches!(
            resolve(TerminalStatus::Expired { signature }),
            Err(RuntimeError::Expired { .. })
        ));
        assert!(matches!(
            resolve(TerminalStatus::Timeout {
                signature,
                last_seen: SubmissionStatus::Processed
            }),
            Err(RuntimeError::Timeout { .. })
        ));
        assert!(matches!(
            resolve(TerminalStatus::NetworkError {
                signature,
                message: "connection refused".to_string()
            }),
            Err(RuntimeError::Network(message)) if message == "connection refused"
        ));
    }
}
