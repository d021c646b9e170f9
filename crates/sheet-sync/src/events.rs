//! Sync event bus: lifecycle events from recurring jobs.
//!
//! The [`EventBus`] is a `tokio::sync::broadcast` channel carrying
//! [`SyncEvent`] values. Any consumer (the CLI logger, a test) can subscribe
//! independently. When no subscribers exist, events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event a job registry emits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A recurring job was registered and its first attempt is due.
    JobStarted {
        job_id: String,
        path: String,
        sheet_id: String,
        interval_secs: u64,
        timestamp: String,
    },
    /// An attempt finished, successfully or not.
    AttemptFinished {
        job_id: String,
        attempt: u64,
        success: bool,
        error: Option<String>,
        elapsed_ms: u64,
    },
    /// A tick fired while the previous attempt was still in flight.
    AttemptSkipped { job_id: String, tick: u64 },
    /// The job was cancelled; no further ticks will fire.
    JobStopped { job_id: String, attempts: u64 },
}

impl SyncEvent {
    pub fn job_id(&self) -> &str {
        match self {
            SyncEvent::JobStarted { job_id, .. }
            | SyncEvent::AttemptFinished { job_id, .. }
            | SyncEvent::AttemptSkipped { job_id, .. }
            | SyncEvent::JobStopped { job_id, .. } => job_id,
        }
    }
}

/// Broadcast bus for [`SyncEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// RFC 3339 timestamp for the current time.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
