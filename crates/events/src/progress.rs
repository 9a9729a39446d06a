//! Per-job progress channel.
//!
//! The monitor holds a [`ProgressReporter`] and pushes human-readable lines
//! into it without waiting; the registry drains the receiving end and stores
//! the latest line on the job. Dropping every reporter closes the channel,
//! which lets the consumer finish after the last queued message.

use flowgen_core::types::JobId;
use tokio::sync::mpsc;

/// Sending half of a job's progress channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    sender: mpsc::UnboundedSender<String>,
}

impl ProgressReporter {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Queue a progress line. Never blocks; lines sent after the consumer
    /// has gone away are dropped.
    pub fn report(&self, message: impl Into<String>) {
        let _ = self.sender.send(message.into());
    }
}

/// Create a progress channel for `job_id`.
pub fn progress_channel(job_id: JobId) -> (ProgressReporter, mpsc::UnboundedReceiver<String>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ProgressReporter { job_id, sender }, receiver)
}
