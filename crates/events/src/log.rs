//! Event audit log.
//!
//! [`EventLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every [`JobEvent`] as a structured `tracing` record. It runs as a
//! long-lived background task and exits when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::{event_types, JobEvent};

/// Background service that writes job events to the log.
pub struct EventLog;

impl EventLog {
    /// Run the logging loop until the channel closes.
    ///
    /// Returns the number of events written, which is handy in tests.
    pub async fn run(mut receiver: broadcast::Receiver<JobEvent>) -> u64 {
        let mut written = 0u64;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::record(&event);
                    written += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event log shutting down");
                    break;
                }
            }
        }
        written
    }

    fn record(event: &JobEvent) {
        match event.event_type.as_str() {
            event_types::JOB_PROGRESS => tracing::debug!(
                job_id = %event.job_id,
                event_type = %event.event_type,
                payload = %event.payload,
                "Job event",
            ),
            event_types::JOB_FAILED => tracing::warn!(
                job_id = %event.job_id,
                event_type = %event.event_type,
                payload = %event.payload,
                "Job event",
            ),
            _ => tracing::info!(
                job_id = %event.job_id,
                event_type = %event.event_type,
                payload = %event.payload,
                "Job event",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use flowgen_core::types::JobId;

    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn drains_and_exits_when_bus_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLog::run(bus.subscribe()));

        bus.publish(JobEvent::new(event_types::JOB_CREATED, JobId::nil()));
        bus.publish(JobEvent::new(event_types::JOB_FAILED, JobId::nil()));
        drop(bus);

        let written = handle.await.expect("event log task should not panic");
        assert_eq!(written, 2);
    }
}
