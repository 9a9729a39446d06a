//! Seam between the pipeline and whatever automates the remote UI.
//!
//! The pipeline only ever talks to a [`UiDriver`]; the WebDriver-backed
//! implementation and the scripted test double both live in the
//! `flowgen-driver` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactReference;
use crate::types::JobId;

/// A named way of locating progress text on the page.
///
/// Strategies are tried in order; the first that yields a percentage wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStrategy {
    pub name: String,
    pub selector: String,
}

impl ProbeStrategy {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
        }
    }
}

/// Normalized browser cookie, ready to be installed into a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// One of `Lax`, `Strict`, `None`.
    pub same_site: String,
    /// Unix seconds. Absent for session cookies.
    pub expiry: Option<i64>,
}

/// Options for launching one automation session.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub cookies: Vec<SessionCookie>,
}

/// Errors surfaced by a UI driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The automation backend could not start a session.
    #[error("Failed to launch session: {0}")]
    Launch(String),

    /// A command sent to the backend failed at the transport level.
    #[error("Driver transport error: {0}")]
    Transport(String),

    /// The backend answered a command with an error.
    #[error("Driver command failed ({status}): {message}")]
    Command { status: u16, message: String },

    /// The session was already closed.
    #[error("Session closed")]
    Closed,
}

/// One live automation session bound to a single job.
///
/// Boolean results mean "the UI step succeeded" (e.g. the new-project
/// control was found and clicked); `Err` means the driver itself failed.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Open the generation tool, falling back to the entry page.
    async fn navigate(&self) -> Result<(), DriverError>;

    /// Whether the page shows a signed-in account.
    async fn check_authenticated(&self) -> Result<bool, DriverError>;

    async fn create_project(&self) -> Result<bool, DriverError>;

    async fn submit_prompt(&self, prompt: &str) -> Result<bool, DriverError>;

    /// Text of every element matching the strategy, in document order.
    async fn query_progress_probe(&self, strategy: &ProbeStrategy)
        -> Result<Vec<String>, DriverError>;

    /// Generated items currently visible, in discovery order.
    async fn discover_artifacts(&self) -> Result<Vec<ArtifactReference>, DriverError>;

    /// Tear the session down. Calling it twice must be harmless.
    async fn close(&self) -> Result<(), DriverError>;
}

impl std::fmt::Debug for dyn UiDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn UiDriver")
    }
}

/// Launches drivers for the resource manager.
#[async_trait]
pub trait UiDriverFactory: Send + Sync {
    async fn launch(
        &self,
        job_id: JobId,
        options: &LaunchOptions,
    ) -> Result<Box<dyn UiDriver>, DriverError>;
}
