//! Submission and confirmation engine
//!
//! Sends signed envelopes to the ledger and tracks each one in a record keyed
//! by signature until the caller has observed a terminal outcome. Waiting is a
//! plain async poll loop: every waiter polls its own signature, no lock is
//! held across an await, and any number of submissions can be in flight over
//! the same ledger connection.

use crate::{
    core::RuntimeConfig,
    ledger::{LedgerClient, LedgerError},
    monitoring::event_stream::{EventStream, SubmissionEvent},
    transaction::assembler::SignedEnvelope,
    types::{Checkpoint, Finality, SubmissionStatus, TerminalStatus},
    Result, RuntimeError,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solana_sdk::{signature::Signature, transaction::Transaction};
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

// ================================
// Submission Types
// ================================

/// Caller-side reference to a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionHandle {
    pub signature: Signature,
    /// Checkpoint the envelope was signed against
    pub checkpoint: Checkpoint,
}

impl From<&SignedEnvelope> for SubmissionHandle {
    fn from(envelope: &SignedEnvelope) -> Self {
        Self {
            signature: envelope.signature(),
            checkpoint: *envelope.checkpoint(),
        }
    }
}

#[derive(Debug, Clone)]
struct SubmissionRecord {
    /// Exact signed transaction, rebroadcast byte for byte
    transaction: Transaction,
    status: SubmissionStatus,
    slot: Option<u64>,
    rebroadcasts: u32,
    submitted_at: DateTime<Utc>,
}

/// Tunables taken from [`RuntimeConfig`]
#[derive(Debug, Clone, Copy)]
struct PollPolicy {
    poll_interval: Duration,
    rebroadcast_every: u32,
    max_rebroadcasts: u32,
}

// ================================
// Engine Implementation
// ================================

pub struct SubmissionEngine<L: LedgerClient> {
    ledger: Arc<L>,
    records: DashMap<Signature, SubmissionRecord>,
    events: Arc<EventStream>,
    policy: PollPolicy,
}

impl<L: LedgerClient> SubmissionEngine<L> {
    pub fn new(ledger: Arc<L>, config: &RuntimeConfig) -> Self {
        Self::with_events(ledger, config, Arc::new(EventStream::new()))
    }

    pub fn with_events(ledger: Arc<L>, config: &RuntimeConfig, events: Arc<EventStream>) -> Self {
        Self {
            ledger,
            records: DashMap::new(),
            events,
            policy: PollPolicy {
                poll_interval: config.poll_interval,
                rebroadcast_every: config.rebroadcast_every.max(1),
                max_rebroadcasts: config.max_rebroadcasts,
            },
        }
    }

    pub fn events(&self) -> &Arc<EventStream> {
        &self.events
    }

    /// Number of submissions whose outcome has not been observed yet
    pub fn in_flight(&self) -> usize {
        self.records.len()
    }

    /// Locally recorded status, if the submission is still tracked
    pub fn status(&self, handle: &SubmissionHandle) -> Option<SubmissionStatus> {
        self.records.get(&handle.signature).map(|r| r.status.clone())
    }

    /// Stop tracking a submission. The transaction itself cannot be recalled.
    pub fn forget(&self, handle: &SubmissionHandle) -> bool {
        self.release(&handle.signature)
    }

    /// Send an envelope once and start tracking it.
    ///
    /// Submitting an envelope that is already tracked does not send it again.
    /// Submitting one that was released sends the identical bytes; the ledger
    /// deduplicates by signature, so nothing executes twice.
    pub async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmissionHandle> {
        let handle = SubmissionHandle::from(envelope);
        let signature = handle.signature;

        if self.records.contains_key(&signature) {
            debug!("Submission {} already tracked", signature);
            return Ok(handle);
        }

        let status = match self.ledger.send_transaction(envelope.transaction()).await {
            Ok(_) => SubmissionStatus::Pending,
            Err(LedgerError::Rejected(reason)) => {
                warn!("Transaction {} rejected: {}", signature, reason);
                SubmissionStatus::Failed(reason)
            }
            Err(LedgerError::Transport(message)) => {
                warn!("Failed to send transaction {}: {}", signature, message);
                return Err(RuntimeError::Network(message));
            }
        };

        let submitted_at = Utc::now();
        info!(
            "Submitted `{}` as {} (valid through block {})",
            envelope.metadata().description,
            signature,
            handle.checkpoint.last_valid_block_height
        );

        self.records.insert(
            signature,
            SubmissionRecord {
                transaction: envelope.transaction().clone(),
                status: status.clone(),
                slot: None,
                rebroadcasts: 0,
                submitted_at,
            },
        );

        self.events.emit(SubmissionEvent::Submitted {
            signature,
            description: envelope.metadata().description.clone(),
            last_valid_block_height: handle.checkpoint.last_valid_block_height,
            at: submitted_at,
        });
        if status != SubmissionStatus::Pending {
            self.events.emit(SubmissionEvent::StatusChanged {
                signature,
                status,
                slot: None,
            });
        }

        Ok(handle)
    }

    /// Wait until the submission reaches `target`, fails, expires, or `timeout` elapses.
    ///
    /// A zero timeout only consults the local record. Timing out abandons the
    /// wait, not the transaction: the record stays tracked and can be awaited
    /// again.
    pub async fn await_status(&self, handle: &SubmissionHandle, target: Finality, timeout: Duration) -> TerminalStatus {
        let signature = handle.signature;

        if let Some(status) = self.status(handle) {
            if let Some(done) = outcome(signature, &status, target) {
                self.release(&signature);
                return done;
            }
        }

        if timeout.is_zero() {
            return self.timed_out(handle);
        }

        match tokio::time::timeout(timeout, self.poll(handle, target)).await {
            Ok(done) => done,
            Err(_) => {
                warn!("Timed out after {:?} waiting for {} to reach {}", timeout, signature, target);
                self.timed_out(handle)
            }
        }
    }

    /// Submit and wait, folding a failed send into [`TerminalStatus::NetworkError`]
    pub async fn submit_and_wait(
        &self,
        envelope: &SignedEnvelope,
        target: Finality,
        timeout: Duration,
    ) -> TerminalStatus {
        match self.submit(envelope).await {
            Ok(handle) => self.await_status(&handle, target, timeout).await,
            Err(RuntimeError::Network(message)) => TerminalStatus::NetworkError {
                signature: envelope.signature(),
                message,
            },
            Err(other) => TerminalStatus::NetworkError {
                signature: envelope.signature(),
                message: other.to_string(),
            },
        }
    }

    async fn poll(&self, handle: &SubmissionHandle, target: Finality) -> TerminalStatus {
        let signature = handle.signature;
        let mut ticker = interval(self.policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 0;

        loop {
            ticker.tick().await;
            polls = polls.wrapping_add(1);

            let status = match self.ledger.get_signature_status(&signature).await {
                Ok(status) => status,
                Err(e) => return network_error(signature, &e),
            };

            let observed = match status {
                Some(status) => Some(status),
                None => {
                    let latest = match self.ledger.get_recent_checkpoint().await {
                        Ok(latest) => latest,
                        Err(e) => return network_error(signature, &e),
                    };

                    if handle.checkpoint.expired_at(latest.block_height) {
                        // It may have landed between the two queries.
                        match self.ledger.get_signature_status(&signature).await {
                            Ok(Some(status)) => Some(status),
                            Ok(None) => {
                                warn!(
                                    "Transaction {} expired at block {} (valid through {})",
                                    signature, latest.block_height, handle.checkpoint.last_valid_block_height
                                );
                                self.update(&signature, SubmissionStatus::Expired, None);
                                self.release(&signature);
                                return TerminalStatus::Expired { signature };
                            }
                            Err(e) => return network_error(signature, &e),
                        }
                    } else {
                        if polls % self.policy.rebroadcast_every == 0 {
                            self.rebroadcast(&signature).await;
                        }
                        None
                    }
                }
            };

            if let Some(status) = observed {
                let next = match status.error {
                    Some(reason) => SubmissionStatus::Failed(reason),
                    None => status.finality.into(),
                };
                let current = self.update(&signature, next, Some(status.slot));

                if let Some(done) = outcome(signature, &current, target) {
                    self.release(&signature);
                    return done;
                }
            }
        }
    }

    /// Apply a monotonic status transition, returning the effective status
    fn update(&self, signature: &Signature, next: SubmissionStatus, slot: Option<u64>) -> SubmissionStatus {
        let Some(mut record) = self.records.get_mut(signature) else {
            return next;
        };

        if !record.status.can_advance_to(&next) {
            return record.status.clone();
        }

        info!("Transaction {} is now {:?}", signature, next);
        record.status = next.clone();
        record.slot = slot.or(record.slot);
        let slot = record.slot;
        drop(record);

        self.events.emit(SubmissionEvent::StatusChanged {
            signature: *signature,
            status: next.clone(),
            slot,
        });
        next
    }

    async fn rebroadcast(&self, signature: &Signature) {
        let (transaction, attempt) = {
            let Some(mut record) = self.records.get_mut(signature) else {
                return;
            };
            if record.rebroadcasts >= self.policy.max_rebroadcasts {
                return;
            }
            record.rebroadcasts += 1;
            (record.transaction.clone(), record.rebroadcasts)
        };

        match self.ledger.send_transaction(&transaction).await {
            Ok(_) => {
                debug!("Rebroadcast {} (attempt {})", signature, attempt);
                self.events.emit(SubmissionEvent::Rebroadcast {
                    signature: *signature,
                    attempt,
                });
            }
            Err(e) => debug!("Rebroadcast of {} failed: {}", signature, e),
        }
    }

    fn release(&self, signature: &Signature) -> bool {
        match self.records.remove(signature) {
            Some((_, record)) => {
                debug!(
                    "Released {} after {}ms",
                    signature,
                    (Utc::now() - record.submitted_at).num_milliseconds()
                );
                self.events.emit(SubmissionEvent::Released { signature: *signature });
                true
            }
            None => false,
        }
    }

    fn timed_out(&self, handle: &SubmissionHandle) -> TerminalStatus {
        TerminalStatus::Timeout {
            signature: handle.signature,
            last_seen: self.status(handle).unwrap_or(SubmissionStatus::Pending),
        }
    }
}

/// Terminal outcome of a wait for `target`, if `status` settles it
fn outcome(signature: Signature, status: &SubmissionStatus, target: Finality) -> Option<TerminalStatus> {
    match status {
        SubmissionStatus::Failed(reason) => Some(TerminalStatus::Failed {
            signature,
            reason: reason.clone(),
        }),
        SubmissionStatus::Expired => Some(TerminalStatus::Expired { signature }),
        reached if reached.reaches(target) => reached
            .finality()
            .map(|finality| TerminalStatus::Reached { signature, finality }),
        _ => None,
    }
}

fn network_error(signature: Signature, err: &LedgerError) -> TerminalStatus {
    warn!("Lost contact with the ledger while waiting for {}: {}", signature, err);
    TerminalStatus::NetworkError {
        signature,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{AccountStore, LocalLedger, LocalLedgerConfig, ProgramProcessor},
        transaction::assembler::{sign, TransactionAssembler},
    };
    use solana_sdk::{
        instruction::{AccountMeta, Instruction},
        pubkey::Pubkey,
        signature::{Keypair, Signer},
        system_instruction,
    };

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            poll_interval: Duration::from_millis(1),
            ..RuntimeConfig::default()
        }
    }

    async fn envelope(ledger: &LocalLedger, payer: &Keypair) -> SignedEnvelope {
        let checkpoint = ledger.get_recent_checkpoint().await.unwrap();
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 10);
        let unsigned = TransactionAssembler::new(payer.pubkey())
            .add_instruction(ix)
            .assemble(checkpoint, "transfer")
            .unwrap();
        sign(unsigned, &[payer]).unwrap()
    }

    #[tokio::test]
    async fn test_reaches_target_and_releases() {
        let ledger = Arc::new(LocalLedger::default());
        let engine = SubmissionEngine::new(ledger.clone(), &config());
        let mut events = engine.events().subscribe();
        let payer = Keypair::new();
        let signed = envelope(&ledger, &payer).await;

        let handle = engine.submit(&signed).await.unwrap();
        assert_eq!(engine.status(&handle), Some(SubmissionStatus::Pending));

        let status = engine.await_status(&handle, Finality::Confirmed, Duration::from_secs(5)).await;
        assert_eq!(
            status,
            TerminalStatus::Reached {
                signature: signed.signature(),
                finality: Finality::Confirmed
            }
        );
        assert_eq!(engine.in_flight(), 0);
        assert!(matches!(events.recv().await.unwrap(), SubmissionEvent::Submitted { .. }));
    }

    struct AlwaysFails;

    impl ProgramProcessor for AlwaysFails {
        fn process(&self, _instruction: &Instruction, _accounts: &mut AccountStore) -> std::result::Result<(), String> {
            Err("custom program error: 0x1770".to_string())
        }
    }

    #[tokio::test]
    async fn test_rejected_send_is_failed() {
        let program = Pubkey::new_unique();
        let ledger = Arc::new(
            LocalLedger::new(LocalLedgerConfig {
                preflight: true,
                ..LocalLedgerConfig::default()
            })
            .with_processor(program, AlwaysFails),
        );
        let engine = SubmissionEngine::new(ledger.clone(), &config());
        let payer = Keypair::new();

        let checkpoint = ledger.get_recent_checkpoint().await.unwrap();
        let unsigned = TransactionAssembler::new(payer.pubkey())
            .add_instruction(Instruction {
                program_id: program,
                accounts: vec![AccountMeta::new(payer.pubkey(), true)],
                data: vec![0],
            })
            .assemble(checkpoint, "always fails")
            .unwrap();
        let signed = sign(unsigned, &[&payer]).unwrap();

        let handle = engine.submit(&signed).await.unwrap();
        let status = engine.await_status(&handle, Finality::Confirmed, Duration::ZERO).await;
        match status {
            TerminalStatus::Failed { reason, .. } => assert!(reason.contains("0x1770")),
            other => panic!("Unexpected status: {other:?}"),
        }
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(ledger.executions().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_is_rebroadcast() {
        let ledger = Arc::new(LocalLedger::default());
        let engine = SubmissionEngine::new(
            ledger.clone(),
            &RuntimeConfig {
                rebroadcast_every: 1,
                max_rebroadcasts: 2,
                ..config()
            },
        );
        let payer = Keypair::new();
        let signed = envelope(&ledger, &payer).await;

        ledger.drop_next_sends(1).await;
        let handle = engine.submit(&signed).await.unwrap();
        let status = engine.await_status(&handle, Finality::Finalized, Duration::from_secs(5)).await;

        assert!(matches!(status, TerminalStatus::Reached { finality: Finality::Finalized, .. }));
        assert_eq!(ledger.executions().await, 1);
    }

    #[tokio::test]
    async fn test_expires_when_never_landed() {
        let ledger = Arc::new(LocalLedger::new(LocalLedgerConfig {
            blockhash_validity: 3,
            ..LocalLedgerConfig::default()
        }));
        let engine = SubmissionEngine::new(
            ledger.clone(),
            &RuntimeConfig {
                max_rebroadcasts: 0,
                ..config()
            },
        );
        let payer = Keypair::new();
        let signed = envelope(&ledger, &payer).await;

        ledger.drop_next_sends(1).await;
        let handle = engine.submit(&signed).await.unwrap();
        let status = engine.await_status(&handle, Finality::Confirmed, Duration::from_secs(5)).await;

        assert_eq!(status, TerminalStatus::Expired { signature: handle.signature });
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(ledger.executions().await, 0);
    }

    #[tokio::test]
    async fn test_zero_timeout_uses_local_record() {
        let ledger = Arc::new(LocalLedger::default());
        let engine = SubmissionEngine::new(ledger.clone(), &config());
        let payer = Keypair::new();
        let signed = envelope(&ledger, &payer).await;

        let handle = engine.submit(&signed).await.unwrap();
        let status = engine.await_status(&handle, Finality::Finalized, Duration::ZERO).await;
        assert_eq!(
            status,
            TerminalStatus::Timeout {
                signature: handle.signature,
                last_seen: SubmissionStatus::Pending
            }
        );
        assert_eq!(engine.in_flight(), 1);
        assert!(engine.forget(&handle));
        assert!(!engine.forget(&handle));
    }

    #[tokio::test]
    async fn test_transport_failure_is_immediate() {
        let ledger = Arc::new(LocalLedger::default());
        let engine = SubmissionEngine::new(ledger.clone(), &config());
        let payer = Keypair::new();
        let signed = envelope(&ledger, &payer).await;

        ledger.fail_next_sends(1).await;
        let started = std::time::Instant::now();
        let status = engine
            .submit_and_wait(&signed, Finality::Confirmed, Duration::from_secs(30))
            .await;

        assert!(matches!(status, TerminalStatus::NetworkError { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_outcome() {
        let signature = Signature::new_unique();
        assert_eq!(outcome(signature, &SubmissionStatus::Processed, Finality::Confirmed), None);
        assert_eq!(
            outcome(signature, &SubmissionStatus::Finalized, Finality::Confirmed),
            Some(TerminalStatus::Reached {
                signature,
                finality: Finality::Finalized
            })
        );
        assert_eq!(
            outcome(signature, &SubmissionStatus::Expired, Finality::Processed),
            Some(TerminalStatus::Expired { signature })
        );
    }
}
