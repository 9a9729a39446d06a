//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. The registry
//! publishes on every state change; the event log (and anything else that
//! cares) subscribes. Share it via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use flowgen_core::types::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event type names published by the job registry.
pub mod event_types {
    pub const JOB_CREATED: &str = "job.created";
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_PROGRESS: &str = "job.progress";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_FAILED: &str = "job.failed";
    pub const JOB_DELETED: &str = "job.deleted";
}

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Something that happened to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,

    pub job_id: JobId,

    /// Event-specific data (progress text, error message, artifact counts).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Create an event with an empty payload.
    pub fn new(event_type: impl Into<String>, job_id: JobId) -> Self {
        Self {
            event_type: event_type.into(),
            job_id,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use flowgen_core::types::JobId;
/// use flowgen_events::bus::{event_types, EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::new(event_types::JOB_CREATED, JobId::nil()));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published with no subscriber attached are dropped.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
