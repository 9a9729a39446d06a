//! Job lifecycle driver.
//!
//! [`JobOrchestrator`] runs each job as its own background task through the
//! fixed stage order: acquire session, navigate, check auth, create project,
//! submit prompt, monitor, ingest. Whatever happens inside (stage failure,
//! panic, cancellation) the session is released and the job ends `Completed`
//! or `Failed`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use flowgen_core::artifact::Artifact;
use flowgen_core::driver::{LaunchOptions, SessionCookie, UiDriver};
use flowgen_core::job::Job;
use flowgen_core::types::JobId;
use flowgen_events::ProgressReporter;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{JobError, RegistryError, ResourceError};
use crate::ingest::{ArtifactPipeline, IngestReport};
use crate::monitor::ProgressMonitor;
use crate::registry::JobRegistry;
use crate::resources::{ResourceHandle, ResourceManager};

/// Input for one generation run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub headless: bool,
    pub cookies: Vec<SessionCookie>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            headless: true,
            cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<SessionCookie>) -> Self {
        self.cookies = cookies;
        self
    }
}

/// What to do when the page does not confirm a signed-in session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Log a warning and carry on.
    #[default]
    Proceed,
    /// Fail the job with [`JobError::Authentication`].
    Require,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wait after project creation before typing the prompt.
    pub project_settle: Duration,
    pub auth_policy: AuthPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            project_settle: Duration::from_secs(5),
            auth_policy: AuthPolicy::Proceed,
        }
    }
}

/// Control handles for a job whose task has not finished.
#[derive(Clone)]
struct ActiveJob {
    cancel: CancellationToken,
    /// Cancelled once the task has recorded the terminal state.
    finished: CancellationToken,
}

impl ActiveJob {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }
}

pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    resources: Arc<ResourceManager>,
    monitor: ProgressMonitor,
    pipeline: ArtifactPipeline,
    config: OrchestratorConfig,
    active: Mutex<HashMap<JobId, ActiveJob>>,
    tasks: TaskTracker,
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        resources: Arc<ResourceManager>,
        monitor: ProgressMonitor,
        pipeline: ArtifactPipeline,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            resources,
            monitor,
            pipeline,
            config,
            active: Mutex::new(HashMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    // ---- Entry points ----

    /// Create a job and run it in the background. Returns immediately.
    pub async fn submit(self: &Arc<Self>, request: GenerationRequest) -> JobId {
        let job_id = self.registry.create(&request.prompt).await;
        self.track(job_id).await;

        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            let _ = this.run(job_id, request).await;
        });
        job_id
    }

    /// Create a job and wait for its terminal state.
    ///
    /// The run still happens on its own task, so dropping this future (for
    /// example on client disconnect) does not abandon the session.
    pub async fn run_sync(self: &Arc<Self>, request: GenerationRequest) -> (JobId, Result<Job, JobError>) {
        let job_id = self.registry.create(&request.prompt).await;
        self.track(job_id).await;

        let this = Arc::clone(self);
        let handle = self.tasks.spawn(async move { this.run(job_id, request).await });

        let result = match handle.await {
            Ok(Ok(_)) => self
                .registry
                .get(job_id)
                .await
                .map_err(|e| JobError::Unexpected(e.to_string())),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(JobError::Unexpected(e.to_string())),
        };
        (job_id, result)
    }

    /// Full lifecycle for an already created job.
    pub async fn run(&self, job_id: JobId, request: GenerationRequest) -> Result<IngestReport, JobError> {
        let active = self.track(job_id).await;

        if let Err(e) = self.registry.mark_running(job_id).await {
            tracing::warn!(%job_id, error = %e, "Job could not start");
            self.forget(job_id, &active).await;
            return Err(if active.cancel.is_cancelled() {
                JobError::Cancelled
            } else {
                JobError::Unexpected(e.to_string())
            });
        }

        let (reporter, consumer) = self.registry.attach_progress(job_id);

        // The launch is not cancellable: once a session is being created it
        // must come back so it can be closed.
        let outcome = match self.acquire(job_id, &request, &active, &reporter).await {
            Ok(handle) => tokio::select! {
                biased;
                _ = active.cancel.cancelled() => Err(JobError::Cancelled),
                result = AssertUnwindSafe(self.execute(job_id, &request, handle.driver.as_ref(), &reporter))
                    .catch_unwind() => {
                    result.unwrap_or_else(|panic| Err(JobError::Unexpected(panic_message(panic))))
                }
            },
            Err(e) => Err(e),
        };

        self.resources.release(job_id).await;
        drop(reporter);
        if let Err(e) = consumer.await {
            tracing::warn!(%job_id, error = %e, "Progress consumer ended abnormally");
        }

        let outcome = self.record(job_id, outcome, &active).await;
        self.forget(job_id, &active).await;
        outcome
    }

    // ---- Control ----

    /// Stop a job that has not finished yet.
    ///
    /// Returns `Ok(false)` when the job had already reached a terminal state.
    pub async fn cancel(&self, job_id: JobId) -> Result<bool, RegistryError> {
        let job = self.registry.get(job_id).await?;
        if job.status.is_terminal() {
            return Ok(false);
        }

        if let Some(active) = self.active.lock().await.get(&job_id) {
            active.cancel.cancel();
        }
        self.resources.cancel(job_id).await;

        match self.registry.fail(job_id, &JobError::Cancelled.to_string()).await {
            Ok(_) => {
                tracing::info!(%job_id, "Job cancelled");
                Ok(true)
            }
            Err(RegistryError::InvalidTransition { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Cancel if needed, remove stored artifacts, then drop the record.
    pub async fn delete_job(&self, job_id: JobId) -> bool {
        match self.cancel(job_id).await {
            Err(RegistryError::NotFound(_)) => return false,
            Err(e) => tracing::warn!(%job_id, error = %e, "Cancel before delete failed"),
            Ok(_) => {}
        }
        self.wait_finished(job_id).await;

        if let Ok(job) = self.registry.get(job_id).await {
            let artifacts: Vec<Artifact> = job.videos.into_iter().chain(job.images).collect();
            if !artifacts.is_empty() {
                let removed = self.pipeline.delete_artifacts(&artifacts).await;
                tracing::info!(%job_id, removed, total = artifacts.len(), "Stored artifacts removed");
            }
        }

        self.registry.delete(job_id).await
    }

    /// Wait until the job's task has recorded its terminal state.
    pub async fn wait_finished(&self, job_id: JobId) {
        let finished = match self.active.lock().await.get(&job_id) {
            Some(active) => active.finished.clone(),
            None => return,
        };
        finished.cancelled().await;
    }

    pub async fn active_jobs(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Cancel every in-flight job, wait up to `timeout` for their tasks, then
    /// release any session still open.
    pub async fn shutdown(&self, timeout: Duration) {
        let active: Vec<ActiveJob> = self.active.lock().await.values().cloned().collect();
        tracing::info!(jobs = active.len(), "Cancelling in-flight jobs");
        for job in &active {
            job.cancel.cancel();
        }

        self.tasks.close();
        if tokio::time::timeout(timeout, self.tasks.wait()).await.is_err() {
            tracing::warn!("Job tasks did not finish before the shutdown timeout");
        }
        self.resources.shutdown().await;
    }

    // ---- private helpers ----

    async fn acquire(
        &self,
        job_id: JobId,
        request: &GenerationRequest,
        active: &ActiveJob,
        reporter: &ProgressReporter,
    ) -> Result<ResourceHandle, JobError> {
        if active.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        reporter.report("Setting up browser and loading cookies...");
        let options = LaunchOptions {
            headless: request.headless,
            cookies: request.cookies.clone(),
        };
        let acquired = AssertUnwindSafe(self.resources.acquire(job_id, &options))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ResourceError::Launch(panic_message(panic))));

        match acquired {
            // A cancel that landed mid-launch has already released the slot;
            // the manager closed the new session.
            _ if active.cancel.is_cancelled() => {
                self.resources.release(job_id).await;
                Err(JobError::Cancelled)
            }
            Ok(handle) => Ok(handle),
            Err(e) => Err(JobError::ResourceAcquisition(e.to_string())),
        }
    }

    async fn execute(
        &self,
        job_id: JobId,
        request: &GenerationRequest,
        driver: &dyn UiDriver,
        reporter: &ProgressReporter,
    ) -> Result<IngestReport, JobError> {
        reporter.report("Navigating to Google Labs...");
        driver
            .navigate()
            .await
            .map_err(|e| JobError::Navigation(e.to_string()))?;

        reporter.report("Checking authentication status...");
        let authenticated = driver.check_authenticated().await.unwrap_or_else(|e| {
            tracing::debug!(%job_id, error = %e, "Authentication check failed");
            false
        });
        if authenticated {
            reporter.report("Authentication confirmed");
        } else {
            match self.config.auth_policy {
                AuthPolicy::Require => return Err(JobError::Authentication),
                AuthPolicy::Proceed => {
                    tracing::warn!(%job_id, "Authentication uncertain, proceeding");
                    reporter.report("Authentication uncertain, proceeding anyway...");
                }
            }
        }

        reporter.report("Creating new project...");
        match driver.create_project().await {
            Ok(true) => {}
            Ok(false) => return Err(JobError::ProjectCreation),
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Project creation errored");
                return Err(JobError::ProjectCreation);
            }
        }
        tokio::time::sleep(self.config.project_settle).await;

        reporter.report(format!("Submitting video prompt: '{}'", request.prompt));
        match driver.submit_prompt(&request.prompt).await {
            Ok(true) => {}
            Ok(false) => return Err(JobError::PromptSubmission),
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Prompt submission errored");
                return Err(JobError::PromptSubmission);
            }
        }

        reporter.report("Monitoring video generation progress...");
        let outcome = self.monitor.run(driver, reporter).await;
        if outcome.is_complete() {
            reporter.report("Videos are ready! Starting download and upload...");
        } else {
            reporter.report("Progress unclear, checking for videos anyway...");
        }

        let report = match self.pipeline.ingest_from(driver, job_id).await {
            Ok(report) => report,
            Err(e) if !outcome.is_complete() => {
                tracing::warn!(%job_id, error = %e, "Discovery failed after monitor timeout");
                return Err(JobError::ProgressTimeout);
            }
            Err(e) => return Err(JobError::Unexpected(e.to_string())),
        };

        if report.discovered() == 0 && !outcome.is_complete() {
            return Err(JobError::ProgressTimeout);
        }
        if report.is_empty() {
            return Err(JobError::ArtifactIngestion);
        }
        Ok(report)
    }

    /// Write the terminal state. A concurrent cancel that got there first
    /// wins, and is reported as the outcome.
    async fn record(
        &self,
        job_id: JobId,
        outcome: Result<IngestReport, JobError>,
        active: &ActiveJob,
    ) -> Result<IngestReport, JobError> {
        match outcome {
            Ok(report) => {
                match self
                    .registry
                    .complete(job_id, report.videos.clone(), report.images.clone())
                    .await
                {
                    Ok(_) => Ok(report),
                    Err(e) => {
                        tracing::warn!(%job_id, error = %e, "Could not record completion");
                        if !report.is_empty() {
                            let mut stored = report.videos;
                            stored.extend(report.images);
                            self.pipeline.delete_artifacts(&stored).await;
                        }
                        Err(if active.cancel.is_cancelled() {
                            JobError::Cancelled
                        } else {
                            JobError::Unexpected(e.to_string())
                        })
                    }
                }
            }
            Err(err) => {
                if let Err(e) = self.registry.fail(job_id, &err.to_string()).await {
                    tracing::debug!(%job_id, error = %e, "Terminal state already recorded");
                }
                Err(err)
            }
        }
    }

    async fn track(&self, job_id: JobId) -> ActiveJob {
        self.active
            .lock()
            .await
            .entry(job_id)
            .or_insert_with(ActiveJob::new)
            .clone()
    }

    async fn forget(&self, job_id: JobId, active: &ActiveJob) {
        self.active.lock().await.remove(&job_id);
        active.finished.cancel();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "job task panicked");
    }

    #[test]
    fn request_defaults_to_headless_without_cookies() {
        let request = GenerationRequest::new("a dog running");
        assert!(request.headless);
        assert!(request.cookies.is_empty());
        assert_eq!(OrchestratorConfig::default().auth_policy, AuthPolicy::Proceed);
    }
}
