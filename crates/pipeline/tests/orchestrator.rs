//! End-to-end runs of the job orchestrator against the scripted driver,
//! the in-memory store and a static fetcher.
//!
//! All tests run on paused time so the 2 s / 300 s / 3 s monitor timings
//! elapse instantly.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use flowgen_core::job::JobStatus;
use flowgen_driver::scripted::{Script, ScriptRecord, ScriptedFactory, SCRIPTED_MEDIA_BASE};
use flowgen_driver::selectors::default_probe_strategies;
use flowgen_events::EventBus;
use flowgen_pipeline::fetch::StaticFetcher;
use flowgen_pipeline::{
    ArtifactPipeline, AuthPolicy, GenerationRequest, JobError, JobOrchestrator, JobRegistry,
    MonitorConfig, OrchestratorConfig, ProgressMonitor, RegistryError, ResourceManager,
};
use flowgen_storage::MemoryStore;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

struct Harness {
    orchestrator: Arc<JobOrchestrator>,
    registry: Arc<JobRegistry>,
    resources: Arc<ResourceManager>,
    store: Arc<MemoryStore>,
    record: Arc<ScriptRecord>,
}

/// Every scripted video and poster up to `count` is downloadable.
fn media(count: u32) -> StaticFetcher {
    (1..=count).fold(StaticFetcher::new(), |fetcher, i| {
        fetcher
            .with(format!("{SCRIPTED_MEDIA_BASE}/video_{i}.mp4"), b"mp4 bytes".to_vec())
            .with(format!("{SCRIPTED_MEDIA_BASE}/poster_{i}.jpg"), JPEG.to_vec())
    })
}

fn harness_with(script: Script, fetcher: StaticFetcher, auth_policy: AuthPolicy) -> Harness {
    let factory = ScriptedFactory::new(script);
    let record = factory.record();

    let registry = Arc::new(JobRegistry::new(Arc::new(EventBus::default())));
    let resources = Arc::new(ResourceManager::new(Arc::new(factory)));
    let monitor = ProgressMonitor::new(MonitorConfig {
        strategies: default_probe_strategies(),
        ..MonitorConfig::default()
    });
    let store = Arc::new(MemoryStore::new());
    let pipeline = ArtifactPipeline::new(store.clone(), Arc::new(fetcher), "videos");
    let config = OrchestratorConfig {
        project_settle: Duration::ZERO,
        auth_policy,
    };

    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&resources),
        monitor,
        pipeline,
        config,
    ));

    Harness {
        orchestrator,
        registry,
        resources,
        store,
        record,
    }
}

fn harness(script: Script) -> Harness {
    harness_with(script, media(4), AuthPolicy::Proceed)
}

impl Harness {
    /// Submit and wait for the terminal state.
    async fn run_to_end(&self, prompt: &str) -> flowgen_core::job::Job {
        let id = self.orchestrator.submit(GenerationRequest::new(prompt)).await;
        self.orchestrator.wait_finished(id).await;
        self.registry.get(id).await.unwrap()
    }

    async fn assert_released(&self) {
        assert_eq!(self.resources.active_count().await, 0);
        assert_eq!(self.record.closes(), self.record.launches());
    }
}

// ---------------------------------------------------------------------------
// Test: successful runs
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn dog_prompt_completes_with_two_videos_and_two_images() {
    let h = harness(
        Script::new()
            .probe("percentage_label", &[&["10%"], &["55%"], &["100%"]])
            .generated_videos(2),
    );

    let job = h.run_to_end("a dog running").await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.videos.len(), 2);
    assert_eq!(job.images.len(), 2);
    assert_eq!(job.error, None);
    assert!(job.completed_at.is_some());
    assert_eq!(job.progress_message.as_deref(), Some("Video generation completed!"));
    assert_eq!(
        job.video_urls(),
        [
            format!("memory://videos/{}/video_1.mp4", job.id),
            format!("memory://videos/{}/video_2.mp4", job.id),
        ]
    );

    assert_eq!(h.record.prompts().await, ["a dog running"]);
    assert_eq!(h.store.len().await, 4);
    h.assert_released().await;
}

#[tokio::test(start_paused = true)]
async fn artifact_count_completes_without_progress_text() {
    let h = harness(Script::new().generated_videos(2));

    let job = h.run_to_end("silent progress").await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.videos.len(), 2);
    h.assert_released().await;
}

#[tokio::test(start_paused = true)]
async fn monitor_timeout_is_not_fatal_when_artifacts_exist() {
    // One video is below the fallback threshold, so the monitor times out.
    let h = harness(Script::new().generated_videos(1));

    let job = h.run_to_end("late video").await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.videos.len(), 1);
    assert_eq!(job.images.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_auth_proceeds_by_default() {
    let h = harness(Script::new().unauthenticated().generated_videos(2));

    let job = h.run_to_end("no avatar").await;

    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn concurrent_jobs_each_get_their_own_session() {
    let h = harness(Script::new().generated_videos(2));

    let mut ids = Vec::new();
    for prompt in ["one", "two", "three"] {
        ids.push(h.orchestrator.submit(GenerationRequest::new(prompt)).await);
    }
    for id in &ids {
        h.orchestrator.wait_finished(*id).await;
        assert_eq!(h.registry.get(*id).await.unwrap().status, JobStatus::Completed);
    }

    assert_eq!(h.record.launches(), 3);
    assert_eq!(h.store.len().await, 12);
    h.assert_released().await;
}

// ---------------------------------------------------------------------------
// Test: stage failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn each_stage_failure_is_recorded_and_releases_the_session() {
    let cases = [
        (Script::new().fail_launch(), "Failed to start browser session:"),
        (Script::new().fail_navigation(), "Failed to navigate to Google Labs:"),
        (
            Script::new().fail_project_creation(),
            "Failed to create new project - cookies may be expired",
        ),
        (
            Script::new().driver_error_on_project(),
            "Failed to create new project - cookies may be expired",
        ),
        (
            Script::new().fail_prompt_submission(),
            "Failed to submit video generation prompt",
        ),
        (
            Script::new().driver_error_on_prompt(),
            "Failed to submit video generation prompt",
        ),
        (
            Script::new()
                .probe("percentage_label", &[&["100%"]])
                .fail_discovery(),
            "Automation error: Artifact discovery failed:",
        ),
    ];

    for (script, expected) in cases {
        let h = harness(script);
        let job = h.run_to_end("doomed").await;

        assert_eq!(job.status, JobStatus::Failed, "{expected}");
        let error = job.error.unwrap();
        assert!(error.starts_with(expected), "{error} vs {expected}");
        assert!(job.videos.is_empty());
        h.assert_released().await;
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_without_artifacts_fails_with_progress_timeout() {
    let h = harness(Script::new());

    let job = h.run_to_end("nothing happens").await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some("Progress monitoring timed out and no videos were found")
    );
    h.assert_released().await;
}

#[tokio::test(start_paused = true)]
async fn losing_every_download_fails_with_ingestion_error() {
    let h = harness_with(
        Script::new().generated_videos(2),
        StaticFetcher::new(),
        AuthPolicy::Proceed,
    );

    let job = h.run_to_end("unreachable media").await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some("Video generation completed but upload failed - no videos or images stored")
    );
}

#[tokio::test(start_paused = true)]
async fn required_auth_fails_unconfirmed_sessions() {
    let h = harness_with(
        Script::new().unauthenticated().generated_videos(2),
        media(2),
        AuthPolicy::Require,
    );

    let job = h.run_to_end("signed out").await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some("Authentication could not be confirmed - cookies may be expired")
    );
    h.assert_released().await;
}

#[tokio::test(start_paused = true)]
async fn driver_panic_is_caught_and_recorded() {
    let h = harness(Script::new().panic_on_submit());

    let job = h.run_to_end("explode").await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some("Automation error: scripted driver panicked while submitting")
    );
    h.assert_released().await;
}

// ---------------------------------------------------------------------------
// Test: synchronous runs
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn run_sync_returns_the_terminal_job() {
    let h = harness(Script::new().generated_videos(2));

    let (id, result) = h.orchestrator.run_sync(GenerationRequest::new("sync")).await;

    let job = result.unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.image_urls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn run_sync_surfaces_the_stage_error() {
    let h = harness(Script::new().fail_prompt_submission());

    let (id, result) = h.orchestrator.run_sync(GenerationRequest::new("sync")).await;

    assert_matches!(result, Err(JobError::PromptSubmission));
    assert_eq!(h.registry.get(id).await.unwrap().status, JobStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn cookies_reach_the_session_launch() {
    let h = harness(Script::new().generated_videos(2));
    let cookie = flowgen_core::driver::SessionCookie {
        name: "SID".into(),
        value: "abc".into(),
        domain: ".google.com".into(),
        path: "/".into(),
        secure: true,
        http_only: true,
        same_site: "Lax".into(),
        expiry: None,
    };

    let request = GenerationRequest::new("with cookies").with_cookies(vec![cookie.clone()]);
    let (_, result) = h.orchestrator.run_sync(request).await;

    assert!(result.is_ok());
    assert_eq!(h.record.cookies().await, vec![vec![cookie]]);
}

// ---------------------------------------------------------------------------
// Test: cancellation, deletion, shutdown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancel_mid_submission_fails_the_job_and_releases() {
    let h = harness(Script::new().slow_submit(Duration::from_secs(60)).generated_videos(2));

    let id = h.orchestrator.submit(GenerationRequest::new("slow")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.registry.get(id).await.unwrap().status, JobStatus::Running);

    assert!(h.orchestrator.cancel(id).await.unwrap());
    h.orchestrator.wait_finished(id).await;

    let job = h.registry.get(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("Job cancelled"));
    assert!(h.record.prompts().await.is_empty());
    h.assert_released().await;

    assert!(!h.orchestrator.cancel(id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_launch_closes_the_late_session() {
    let h = harness(Script::new().slow_launch(Duration::from_secs(5)).generated_videos(2));

    let id = h.orchestrator.submit(GenerationRequest::new("slow start")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.record.launches(), 1);
    assert_eq!(h.record.closes(), 0);

    assert!(h.orchestrator.cancel(id).await.unwrap());
    h.orchestrator.wait_finished(id).await;

    let job = h.registry.get(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("Job cancelled"));
    assert_eq!(h.record.launches(), 1);
    h.assert_released().await;
    assert!(h.record.prompts().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_unknown_job_is_not_found() {
    let h = harness(Script::new());
    assert_matches!(
        h.orchestrator.cancel(uuid_like()).await,
        Err(RegistryError::NotFound(_))
    );
}

#[tokio::test(start_paused = true)]
async fn delete_completed_job_removes_artifacts_and_record() {
    let h = harness(Script::new().generated_videos(2));
    let job = h.run_to_end("to delete").await;
    assert_eq!(h.store.len().await, 4);

    assert!(h.orchestrator.delete_job(job.id).await);

    assert!(h.store.is_empty().await);
    assert_matches!(h.registry.get(job.id).await, Err(RegistryError::NotFound(_)));
    assert!(!h.orchestrator.delete_job(job.id).await);
}

#[tokio::test(start_paused = true)]
async fn delete_running_job_cancels_first() {
    let h = harness(Script::new().slow_submit(Duration::from_secs(60)));

    let id = h.orchestrator.submit(GenerationRequest::new("slow")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(h.orchestrator.delete_job(id).await);
    assert_matches!(h.registry.get(id).await, Err(RegistryError::NotFound(_)));
    assert_eq!(h.orchestrator.active_jobs().await, 0);
    h.assert_released().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_in_flight_jobs() {
    let h = harness(Script::new().slow_submit(Duration::from_secs(60)));

    let a = h.orchestrator.submit(GenerationRequest::new("a")).await;
    let b = h.orchestrator.submit(GenerationRequest::new("b")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.resources.active_count().await, 2);

    h.orchestrator.shutdown(Duration::from_secs(5)).await;

    for id in [a, b] {
        let job = h.registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Job cancelled"));
    }
    h.assert_released().await;
}

fn uuid_like() -> flowgen_core::types::JobId {
    flowgen_core::types::JobId::from_u128(0xfeed)
}
