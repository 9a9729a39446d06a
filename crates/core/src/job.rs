//! Job record and lifecycle states.
//!
//! A job moves strictly forward through
//! `pending -> running -> (completed | failed)`. Terminal states are never
//! left; the registry enforces this with [`JobStatus::can_transition_to`].

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` respects the forward-only
    /// lifecycle.
    ///
    /// `Pending -> Failed` is allowed so a job can be failed (or cancelled)
    /// before its task ever started running.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Wire name, as used in JSON and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One generation request and everything recorded about it.
///
/// Instances handed out by the registry are snapshots; mutating one has no
/// effect on the stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub prompt: String,
    /// Latest human-readable progress line (last write wins).
    pub progress_message: Option<String>,
    /// Durable videos, ordered by sequence index. Empty until completed.
    pub videos: Vec<Artifact>,
    /// Durable images (posters), ordered by sequence index.
    pub images: Vec<Artifact>,
    /// Present iff `status == Failed`.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Build a fresh `Pending` record.
    pub fn new(id: JobId, prompt: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            prompt: prompt.into(),
            progress_message: None,
            videos: Vec::new(),
            images: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Durable URLs of the attached videos, in order.
    pub fn video_urls(&self) -> Vec<String> {
        self.videos.iter().map(|a| a.durable_url.clone()).collect()
    }

    /// Durable URLs of the attached images, in order.
    pub fn image_urls(&self) -> Vec<String> {
        self.images.iter().map(|a| a.durable_url.clone()).collect()
    }
}
