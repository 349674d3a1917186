//! Hotel Runtime
//!
//! Client-side request/confirm core for the `hotel_tokenization` program:
//! descriptor-driven instruction building, transaction assembly and signing,
//! submission with confirmation tracking, and resolution of the outcome into
//! a signature or a typed error.

// ================================
// Module Declarations
// ================================

pub mod core;
pub mod types;

// Interface description and typed operations
pub mod descriptor;
pub use descriptor::{Descriptor, DescriptorError, Operation};

// Transaction building
pub mod transaction {
    pub mod assembler;
    pub mod instructions;

    pub use assembler::{sign, SignedEnvelope, TransactionAssembler, TransactionMetadata, UnsignedEnvelope};
    pub use instructions::{build, ArgValue, InstructionBuilder};
}

// Submission events
pub mod monitoring {
    pub mod event_stream;

    pub use event_stream::{EventFilter, EventStream, FilteredEventStream, SubmissionEvent};
}

// Ledger collaborator
pub mod ledger;

// Submission, confirmation and resolution
pub mod client;
pub mod resolver;
pub mod submission;

// Simulated programs: the hotel and its liquidity pool
pub mod program;

// ================================
// Public API Re-exports
// ================================

// Configuration and errors
pub use crate::core::{Result, RetryPolicy, RuntimeConfig, RuntimeError};

// Transaction management
pub use transaction::{ArgValue, SignedEnvelope, TransactionAssembler, UnsignedEnvelope};

// Ledger
pub use ledger::{LedgerClient, LedgerError, LocalLedger, LocalLedgerConfig, RpcLedger};

// Monitoring and events
pub use monitoring::{EventStream, SubmissionEvent};

// Submission pipeline
pub use client::ProgramClient;
pub use resolver::resolve;
pub use submission::{SubmissionEngine, SubmissionHandle};

// Programs
pub use program::{
    HotelOperation, HotelProgram, PoolOperation, PoolProgram, HOTEL_PROGRAM_ID, LIQUIDITY_POOL_PROGRAM_ID,
};

// Common types
pub use types::{Checkpoint, Finality, SignatureStatus, SubmissionStatus, TerminalStatus};
