//! Scripted in-memory driver.
//!
//! [`ScriptedFactory`] hands out [`ScriptedDriver`]s that follow a
//! [`Script`]: which stages succeed, what each progress probe returns on
//! successive ticks, and which artifacts are on the page. Every launch shares
//! one [`ScriptRecord`] so tests can assert on what happened afterwards
//! (sessions opened and closed, prompts submitted, cookies passed).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowgen_core::artifact::ArtifactReference;
use flowgen_core::driver::{
    DriverError, LaunchOptions, ProbeStrategy, SessionCookie, UiDriver, UiDriverFactory,
};
use flowgen_core::types::JobId;
use tokio::sync::Mutex;

/// Base URL scripted artifacts point at.
pub const SCRIPTED_MEDIA_BASE: &str = "https://storage.googleapis.com/flow-scripted";

/// Behaviour of every driver launched from one factory.
#[derive(Debug, Clone)]
pub struct Script {
    pub fail_launch: bool,
    /// Delay inside `launch` before the session is handed back.
    pub launch_delay: Option<Duration>,
    pub fail_navigation: bool,
    pub authenticated: bool,
    pub fail_project_creation: bool,
    /// `create_project` errors at the driver level instead of reporting `false`.
    pub project_creation_error: bool,
    pub fail_prompt_submission: bool,
    pub prompt_submission_error: bool,
    pub panic_on_submit: bool,
    /// Delay inside `submit_prompt`, for exercising cancellation mid-stage.
    pub submit_delay: Option<Duration>,
    /// Per strategy name, the texts returned on successive probe calls.
    /// Calls past the end return nothing.
    pub probes: HashMap<String, Vec<Vec<String>>>,
    pub artifacts: Vec<ArtifactReference>,
    pub fail_discovery: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_launch: false,
            launch_delay: None,
            fail_navigation: false,
            authenticated: true,
            fail_project_creation: false,
            project_creation_error: false,
            fail_prompt_submission: false,
            prompt_submission_error: false,
            panic_on_submit: false,
            submit_delay: None,
            probes: HashMap::new(),
            artifacts: Vec::new(),
            fail_discovery: false,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn slow_launch(mut self, delay: Duration) -> Self {
        self.launch_delay = Some(delay);
        self
    }

    pub fn fail_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn fail_project_creation(mut self) -> Self {
        self.fail_project_creation = true;
        self
    }

    pub fn fail_prompt_submission(mut self) -> Self {
        self.fail_prompt_submission = true;
        self
    }

    pub fn panic_on_submit(mut self) -> Self {
        self.panic_on_submit = true;
        self
    }

    /// `create_project` fails with a transport error, like a WebDriver call
    /// that timed out.
    pub fn driver_error_on_project(mut self) -> Self {
        self.project_creation_error = true;
        self
    }

    /// `submit_prompt` fails with a transport error.
    pub fn driver_error_on_prompt(mut self) -> Self {
        self.prompt_submission_error = true;
        self
    }

    pub fn slow_submit(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Texts `strategy` returns on successive ticks.
    pub fn probe(mut self, strategy: &str, ticks: &[&[&str]]) -> Self {
        let ticks = ticks
            .iter()
            .map(|tick| tick.iter().map(|t| t.to_string()).collect())
            .collect();
        self.probes.insert(strategy.to_string(), ticks);
        self
    }

    pub fn artifacts(mut self, artifacts: Vec<ArtifactReference>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// `count` videos, each with a poster, indexed from 1.
    pub fn generated_videos(self, count: u32) -> Self {
        self.artifacts(scripted_references(count))
    }

    pub fn fail_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }
}

/// `count` references shaped like the real page: storage-hosted videos with
/// poster images.
pub fn scripted_references(count: u32) -> Vec<ArtifactReference> {
    (1..=count)
        .map(|i| {
            ArtifactReference::video(
                i,
                format!("{SCRIPTED_MEDIA_BASE}/video_{i}.mp4"),
                Some(format!("{SCRIPTED_MEDIA_BASE}/poster_{i}.jpg")),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// What the drivers of one factory were asked to do.
#[derive(Debug, Default)]
pub struct ScriptRecord {
    launches: AtomicUsize,
    closes: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    cookies: Mutex<Vec<Vec<SessionCookie>>>,
}

impl ScriptRecord {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Drivers closed (first `close` per driver only).
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Cookie set passed to each launch, in launch order.
    pub async fn cookies(&self) -> Vec<Vec<SessionCookie>> {
        self.cookies.lock().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct ScriptedDriver {
    job_id: JobId,
    script: Script,
    record: Arc<ScriptRecord>,
    probe_cursor: Mutex<HashMap<String, usize>>,
    closed: AtomicBool,
}

impl ScriptedDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UiDriver for ScriptedDriver {
    async fn navigate(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        if self.script.fail_navigation {
            return Err(DriverError::Transport("entry page unreachable".into()));
        }
        Ok(())
    }

    async fn check_authenticated(&self) -> Result<bool, DriverError> {
        self.ensure_open()?;
        Ok(self.script.authenticated)
    }

    async fn create_project(&self) -> Result<bool, DriverError> {
        self.ensure_open()?;
        if self.script.project_creation_error {
            return Err(DriverError::Transport("request timed out".into()));
        }
        Ok(!self.script.fail_project_creation)
    }

    async fn submit_prompt(&self, prompt: &str) -> Result<bool, DriverError> {
        self.ensure_open()?;
        if let Some(delay) = self.script.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.prompt_submission_error {
            return Err(DriverError::Transport("request timed out".into()));
        }
        if self.script.panic_on_submit {
            panic!("scripted driver panicked while submitting");
        }
        self.record.prompts.lock().await.push(prompt.to_string());
        Ok(!self.script.fail_prompt_submission)
    }

    async fn query_progress_probe(
        &self,
        strategy: &ProbeStrategy,
    ) -> Result<Vec<String>, DriverError> {
        self.ensure_open()?;
        let Some(ticks) = self.script.probes.get(&strategy.name) else {
            return Ok(Vec::new());
        };
        let mut cursor = self.probe_cursor.lock().await;
        let position = cursor.entry(strategy.name.clone()).or_insert(0);
        let texts = ticks.get(*position).cloned().unwrap_or_default();
        *position += 1;
        Ok(texts)
    }

    async fn discover_artifacts(&self) -> Result<Vec<ArtifactReference>, DriverError> {
        self.ensure_open()?;
        if self.script.fail_discovery {
            return Err(DriverError::Command {
                status: 500,
                message: "video list unavailable".into(),
            });
        }
        Ok(self.script.artifacts.clone())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.record.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct ScriptedFactory {
    script: Script,
    record: Arc<ScriptRecord>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            record: Arc::new(ScriptRecord::default()),
        }
    }

    pub fn record(&self) -> Arc<ScriptRecord> {
        Arc::clone(&self.record)
    }
}

#[async_trait]
impl UiDriverFactory for ScriptedFactory {
    async fn launch(
        &self,
        job_id: JobId,
        options: &LaunchOptions,
    ) -> Result<Box<dyn UiDriver>, DriverError> {
        if self.script.fail_launch {
            return Err(DriverError::Launch("scripted launch failure".into()));
        }
        self.record.launches.fetch_add(1, Ordering::SeqCst);
        self.record.cookies.lock().await.push(options.cookies.clone());
        if let Some(delay) = self.script.launch_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(Box::new(ScriptedDriver {
            job_id,
            script: self.script.clone(),
            record: Arc::clone(&self.record),
            probe_cursor: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

impl std::fmt::Debug for ScriptedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedDriver")
            .field("job_id", &self.job_id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn probes_advance_per_call() {
        let factory = ScriptedFactory::new(Script::new().probe("p", &[&["10%"], &[], &["100%"]]));
        let driver = factory
            .launch(JobId::nil(), &LaunchOptions::default())
            .await
            .unwrap();
        let strategy = ProbeStrategy::new("p", ".x");

        assert_eq!(driver.query_progress_probe(&strategy).await.unwrap(), ["10%"]);
        assert!(driver.query_progress_probe(&strategy).await.unwrap().is_empty());
        assert_eq!(driver.query_progress_probe(&strategy).await.unwrap(), ["100%"]);
        assert!(driver.query_progress_probe(&strategy).await.unwrap().is_empty());

        let other = ProbeStrategy::new("unscripted", ".y");
        assert!(driver.query_progress_probe(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_driver_rejects_calls_and_counts_once() {
        let factory = ScriptedFactory::new(Script::new());
        let record = factory.record();
        let driver = factory
            .launch(JobId::nil(), &LaunchOptions::default())
            .await
            .unwrap();

        driver.close().await.unwrap();
        driver.close().await.unwrap();
        assert_eq!(record.closes(), 1);
        assert_matches!(driver.navigate().await, Err(DriverError::Closed));
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let factory = ScriptedFactory::new(Script::new().fail_launch());
        assert_matches!(
            factory.launch(JobId::nil(), &LaunchOptions::default()).await,
            Err(DriverError::Launch(_))
        );
        assert_eq!(factory.record().launches(), 0);
    }

    #[test]
    fn generated_videos_have_posters_and_ordered_indices() {
        let refs = scripted_references(2);
        assert_eq!(refs[0].sequence_index, 1);
        assert_eq!(refs[1].sequence_index, 2);
        assert!(refs.iter().all(|r| r.poster_url.is_some()));
    }
}
