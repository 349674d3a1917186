//! Caller-facing program client
//!
//! [`ProgramClient::invoke`] is the whole pipeline in one call: build the
//! instruction from the descriptor, assemble and sign it against a fresh
//! checkpoint, submit it, wait for the configured finality and resolve the
//! outcome into a signature or a typed error.

use crate::{
    core::RuntimeConfig,
    descriptor::{Descriptor, Operation},
    ledger::LedgerClient,
    monitoring::event_stream::SubmissionEvent,
    resolver::resolve,
    submission::{SubmissionEngine, SubmissionHandle},
    transaction::{
        assembler::{sign, TransactionAssembler},
        instructions::{ArgValue, InstructionBuilder},
    },
    types::TerminalStatus,
    Result, RuntimeError,
};
use solana_sdk::{
    instruction::AccountMeta,
    signature::{Keypair, Signature},
    signer::Signer,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ProgramClient<L: LedgerClient, O: Operation> {
    descriptor: Arc<Descriptor<O>>,
    ledger: Arc<L>,
    engine: Arc<SubmissionEngine<L>>,
    payer: Arc<Keypair>,
    config: RuntimeConfig,
}

impl<L: LedgerClient, O: Operation> ProgramClient<L, O> {
    pub fn new(descriptor: Arc<Descriptor<O>>, ledger: Arc<L>, payer: Arc<Keypair>, config: RuntimeConfig) -> Self {
        let engine = Arc::new(SubmissionEngine::new(ledger.clone(), &config));
        Self::with_engine(descriptor, ledger, engine, payer, config)
    }

    /// Share one engine (and its record table) between several clients
    pub fn with_engine(
        descriptor: Arc<Descriptor<O>>,
        ledger: Arc<L>,
        engine: Arc<SubmissionEngine<L>>,
        payer: Arc<Keypair>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            descriptor,
            ledger,
            engine,
            payer,
            config,
        }
    }

    pub fn descriptor(&self) -> &Arc<Descriptor<O>> {
        &self.descriptor
    }

    pub fn engine(&self) -> &Arc<SubmissionEngine<L>> {
        &self.engine
    }

    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Invoke `operation` and wait for the configured finality.
    ///
    /// The payer always signs; `extra_signers` covers any other account the
    /// operation requires to sign. An expired transaction is only re-signed
    /// and resubmitted when the retry policy allows it. A timeout or lost
    /// connection stops tracking the transaction; it may still land.
    pub async fn invoke(
        &self,
        operation: O,
        args: &[ArgValue],
        accounts: &[AccountMeta],
        extra_signers: &[&dyn Signer],
    ) -> Result<Signature> {
        let instruction = InstructionBuilder::new(&self.descriptor).build(operation, args, accounts)?;

        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(extra_signers.len() + 1);
        signers.push(self.payer.as_ref());
        signers.extend_from_slice(extra_signers);

        let mut resubmits = 0;
        let mut expired: Option<Signature> = None;

        loop {
            let checkpoint = self
                .ledger
                .get_recent_checkpoint()
                .await
                .map_err(|e| RuntimeError::Network(e.to_string()))?;

            let unsigned = TransactionAssembler::new(self.payer.pubkey())
                .add_instruction(instruction.clone())
                .with_compute_units(self.config.compute_units)
                .with_priority_fee(self.config.priority_fee)
                .assemble(checkpoint, operation.name())?;
            let signed = sign(unsigned, &signers)?;

            if let Some(previous) = expired.take() {
                info!(
                    "Resubmitting `{}` as {} (replaces expired {}, attempt {})",
                    operation.name(),
                    signed.signature(),
                    previous,
                    resubmits
                );
                self.engine.events().emit(SubmissionEvent::Resubmitted {
                    expired: previous,
                    replacement: signed.signature(),
                    attempt: resubmits,
                });
            }

            let status = self
                .engine
                .submit_and_wait(&signed, self.config.target_finality, self.config.confirm_timeout)
                .await;

            match status {
                TerminalStatus::Expired { signature } if self.config.retry.allows(resubmits) => {
                    warn!("`{}` expired as {}", operation.name(), signature);
                    resubmits += 1;
                    expired = Some(signature);
                }
                TerminalStatus::Timeout { .. } | TerminalStatus::NetworkError { .. } => {
                    // Nothing else holds the handle.
                    self.engine.forget(&SubmissionHandle::from(&signed));
                    return resolve(status);
                }
                other => return resolve(other).map_err(|e| self.annotate(e)),
            }
        }
    }

    /// Resolve `name` against the operation enum and invoke it
    pub async fn invoke_named(
        &self,
        name: &str,
        args: &[ArgValue],
        accounts: &[AccountMeta],
        extra_signers: &[&dyn Signer],
    ) -> Result<Signature> {
        let operation = O::from_name(name).ok_or_else(|| RuntimeError::UnknownOperation(name.to_string()))?;
        self.invoke(operation, args, accounts, extra_signers).await
    }

    fn annotate(&self, err: RuntimeError) -> RuntimeError {
        match err {
            RuntimeError::Failed { signature, reason } => RuntimeError::Failed {
                signature,
                reason: self.descriptor.describe_failure(&reason),
            },
            other => other,
        }
    }
}
