use flowgen_core::driver::DriverError;
use flowgen_core::job::JobStatus;
use flowgen_core::types::JobId;

/// Why a job ended in `Failed`. The Display text is stored as the job's
/// `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Failed to start browser session: {0}")]
    ResourceAcquisition(String),

    #[error("Failed to navigate to Google Labs: {0}")]
    Navigation(String),

    /// Only raised when authentication is required by policy.
    #[error("Authentication could not be confirmed - cookies may be expired")]
    Authentication,

    #[error("Failed to create new project - cookies may be expired")]
    ProjectCreation,

    #[error("Failed to submit video generation prompt")]
    PromptSubmission,

    #[error("Progress monitoring timed out and no videos were found")]
    ProgressTimeout,

    #[error("Video generation completed but upload failed - no videos or images stored")]
    ArtifactIngestion,

    #[error("Job cancelled")]
    Cancelled,

    #[error("Automation error: {0}")]
    Unexpected(String),
}

/// Misuse of the job registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Errors from the resource manager.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Job {0} already has an active session")]
    AlreadyActive(JobId),

    #[error("Session launch failed: {0}")]
    Launch(String),

    /// The job was released (cancelled) while its session was starting.
    #[error("Session for job {0} was released during launch")]
    Released(JobId),
}

/// Failure of the artifact pipeline as a whole, as opposed to per-item loss.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Artifact discovery failed: {0}")]
    Discovery(#[from] DriverError),
}
