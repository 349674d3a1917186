//! Submission event streaming

use crate::types::SubmissionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, error};

/// Submission lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubmissionEvent {
    /// Transaction sent to the ledger for the first time
    Submitted {
        signature: Signature,
        description: String,
        last_valid_block_height: u64,
        at: DateTime<Utc>,
    },

    /// Local status advanced
    StatusChanged {
        signature: Signature,
        status: SubmissionStatus,
        slot: Option<u64>,
    },

    /// Identical signed bytes sent again while pending
    Rebroadcast { signature: Signature, attempt: u32 },

    /// Expired transaction replaced by a freshly signed one
    Resubmitted {
        expired: Signature,
        replacement: Signature,
        attempt: u32,
    },

    /// Caller observed a terminal outcome and the record was released
    Released { signature: Signature },
}

impl SubmissionEvent {
    pub fn signature(&self) -> &Signature {
        match self {
            SubmissionEvent::Submitted { signature, .. }
            | SubmissionEvent::StatusChanged { signature, .. }
            | SubmissionEvent::Rebroadcast { signature, .. }
            | SubmissionEvent::Released { signature } => signature,
            SubmissionEvent::Resubmitted { replacement, .. } => replacement,
        }
    }
}

/// Event stream for broadcasting submission events
pub struct EventStream {
    sender: broadcast::Sender<SubmissionEvent>,
    receiver_count: AtomicUsize,
}

impl EventStream {
    /// Create a new event stream
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000); // Buffer up to 1000 events

        Self {
            sender,
            receiver_count: AtomicUsize::new(0),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.receiver_count.fetch_add(1, Ordering::Relaxed);
        self.sender.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: SubmissionEvent) {
        debug!("Emitting event: {:?}", event);

        match self.sender.send(event) {
            Ok(count) => {
                debug!("Event sent to {} receivers", count);
            }
            Err(e) => {
                // No receivers, event is dropped
                debug!("No receivers for event: {:?}", e);
            }
        }
    }

    /// Number of subscriptions handed out so far
    pub fn receiver_count(&self) -> usize {
        self.receiver_count.load(Ordering::Relaxed)
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub include_status_changes: bool,
    pub include_rebroadcasts: bool,
    pub signature_filter: Option<Vec<Signature>>,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            include_status_changes: true,
            include_rebroadcasts: true,
            signature_filter: None,
        }
    }
}

impl EventFilter {
    /// Check if an event passes the filter
    pub fn matches(&self, event: &SubmissionEvent) -> bool {
        if let Some(signatures) = &self.signature_filter {
            if !signatures.contains(event.signature()) {
                return false;
            }
        }

        match event {
            SubmissionEvent::StatusChanged { .. } => self.include_status_changes,
            SubmissionEvent::Rebroadcast { .. } => self.include_rebroadcasts,
            _ => true,
        }
    }
}

/// Filtered event stream wrapper
pub struct FilteredEventStream {
    receiver: broadcast::Receiver<SubmissionEvent>,
    filter: EventFilter,
}

impl FilteredEventStream {
    /// Create a filtered event stream
    pub fn new(receiver: broadcast::Receiver<SubmissionEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive next filtered event
    pub async fn recv(&mut self) -> Option<SubmissionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("Event stream lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return None;
                }
            }
        }
    }
}
