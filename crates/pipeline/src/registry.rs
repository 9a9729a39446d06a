//! In-memory job registry.
//!
//! [`JobRegistry`] is the only place job records live. Callers get
//! snapshots; every mutation goes through a method that enforces the
//! forward-only lifecycle and publishes a [`JobEvent`] on the bus.

use std::collections::HashMap;
use std::sync::Arc;

use flowgen_core::artifact::Artifact;
use flowgen_core::job::{Job, JobStatus};
use flowgen_core::types::JobId;
use flowgen_events::bus::event_types;
use flowgen_events::{progress_channel, EventBus, JobEvent, ProgressReporter};
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::RegistryError;

/// Default number of jobs returned by [`JobRegistry::list_recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// Creation order, oldest first.
    order: Vec<JobId>,
}

/// Concurrency-safe store of job records.
pub struct JobRegistry {
    inner: RwLock<Inner>,
    events: Arc<EventBus>,
}

impl JobRegistry {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Insert a fresh `Pending` job and return its id.
    pub async fn create(&self, prompt: &str) -> JobId {
        let id = JobId::new_v4();
        let job = Job::new(id, prompt);
        {
            let mut inner = self.inner.write().await;
            inner.jobs.insert(id, job);
            inner.order.push(id);
        }

        tracing::info!(job_id = %id, "Job created");
        self.events.publish(
            JobEvent::new(event_types::JOB_CREATED, id).with_payload(json!({ "prompt": prompt })),
        );
        id
    }

    pub async fn get(&self, id: JobId) -> Result<Job, RegistryError> {
        self.inner
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Up to `limit` jobs, newest first.
    pub async fn list_recent(&self, limit: usize) -> Vec<Job> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.jobs.is_empty()
    }

    /// `Pending -> Running`.
    pub async fn mark_running(&self, id: JobId) -> Result<(), RegistryError> {
        self.transition(id, JobStatus::Running, |_| {}).await?;
        self.events.publish(JobEvent::new(event_types::JOB_STARTED, id));
        Ok(())
    }

    /// Record the latest progress line. Unknown or terminal jobs are ignored.
    pub async fn update_progress(&self, id: JobId, message: &str) {
        {
            let mut inner = self.inner.write().await;
            let Some(job) = inner.jobs.get_mut(&id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }
            job.progress_message = Some(message.to_string());
            job.updated_at = chrono::Utc::now();
        }

        tracing::debug!(job_id = %id, message, "Job progress");
        self.events.publish(
            JobEvent::new(event_types::JOB_PROGRESS, id).with_payload(json!({ "message": message })),
        );
    }

    /// `Running -> Completed`, attaching the durable artifacts.
    pub async fn complete(
        &self,
        id: JobId,
        videos: Vec<Artifact>,
        images: Vec<Artifact>,
    ) -> Result<Job, RegistryError> {
        let (video_count, image_count) = (videos.len(), images.len());
        let job = self
            .transition(id, JobStatus::Completed, move |job| {
                job.videos = videos;
                job.images = images;
                job.progress_message = Some("Video generation completed!".to_string());
                job.completed_at = Some(job.updated_at);
            })
            .await?;

        tracing::info!(job_id = %id, videos = video_count, images = image_count, "Job completed");
        self.events.publish(
            JobEvent::new(event_types::JOB_COMPLETED, id)
                .with_payload(json!({ "videos": video_count, "images": image_count })),
        );
        Ok(job)
    }

    /// Move the job to `Failed` with `error`.
    ///
    /// Failing an already-failed job with the same error is accepted and
    /// changes nothing.
    pub async fn fail(&self, id: JobId, error: &str) -> Result<Job, RegistryError> {
        let job = {
            let mut inner = self.inner.write().await;
            let job = inner.jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
            if job.status == JobStatus::Failed && job.error.as_deref() == Some(error) {
                return Ok(job.clone());
            }
            apply_transition(job, JobStatus::Failed, |job| {
                job.error = Some(error.to_string());
                job.completed_at = Some(job.updated_at);
            })?
        };

        tracing::error!(job_id = %id, error, "Job failed");
        self.events.publish(
            JobEvent::new(event_types::JOB_FAILED, id).with_payload(json!({ "error": error })),
        );
        Ok(job)
    }

    /// Remove the record. Returns `false` if it did not exist.
    pub async fn delete(&self, id: JobId) -> bool {
        let removed = {
            let mut inner = self.inner.write().await;
            let removed = inner.jobs.remove(&id).is_some();
            if removed {
                inner.order.retain(|existing| *existing != id);
            }
            removed
        };

        if removed {
            tracing::info!(job_id = %id, "Job deleted");
            self.events.publish(JobEvent::new(event_types::JOB_DELETED, id));
        }
        removed
    }

    /// Open a progress channel for `id` and spawn the task that applies its
    /// messages to the record.
    ///
    /// The task ends once every [`ProgressReporter`] clone is dropped and
    /// the queued messages are applied; await the handle to drain it.
    pub fn attach_progress(self: &Arc<Self>, id: JobId) -> (ProgressReporter, JoinHandle<()>) {
        let (reporter, mut receiver) = progress_channel(id);
        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                registry.update_progress(id, &message).await;
            }
        });
        (reporter, handle)
    }

    // ---- private helpers ----

    async fn transition<F>(&self, id: JobId, next: JobStatus, mutate: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job),
    {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        apply_transition(job, next, mutate)
    }
}

/// Apply `mutate` and move to `next` if the lifecycle allows it.
fn apply_transition<F>(job: &mut Job, next: JobStatus, mutate: F) -> Result<Job, RegistryError>
where
    F: FnOnce(&mut Job),
{
    if !job.status.can_transition_to(next) {
        return Err(RegistryError::InvalidTransition {
            id: job.id,
            from: job.status,
            to: next,
        });
    }

    job.status = next;
    job.updated_at = chrono::Utc::now();
    mutate(job);
    Ok(job.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
