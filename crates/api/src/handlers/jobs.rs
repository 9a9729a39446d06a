//! Handlers for job records.

use axum::extract::{Path, State};
use axum::Json;
use flowgen_core::error::CoreError;
use flowgen_core::job::{Job, JobStatus};
use flowgen_core::types::{JobId, Timestamp};
use flowgen_pipeline::registry::DEFAULT_RECENT_LIMIT;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Job as returned over HTTP: artifacts flattened to their URLs.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub status: JobStatus,
    pub prompt: String,
    pub progress_message: Option<String>,
    pub videos: Vec<String>,
    pub images: Vec<String>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            videos: job.video_urls(),
            images: job.image_urls(),
            id: job.id,
            status: job.status,
            prompt: job.prompt,
            progress_message: job.progress_message,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobList {
    pub jobs: Vec<JobResponse>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Job ids are opaque to clients: anything that is not one of ours is
/// simply not found.
fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse().map_err(|_| {
        AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: raw.to_string(),
        })
    })
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /job/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobResponse>> {
    let id = parse_job_id(&id)?;
    let job = state.orchestrator.registry().get(id).await?;
    Ok(Json(job.into()))
}

/// GET /jobs
///
/// The most recent jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobList> {
    let jobs = state
        .orchestrator
        .registry()
        .list_recent(DEFAULT_RECENT_LIMIT)
        .await;
    Json(JobList {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
    })
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// POST /job/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CancelResponse>> {
    let id = parse_job_id(&id)?;
    let cancelled = state.orchestrator.cancel(id).await?;
    Ok(Json(CancelResponse {
        job_id: id,
        cancelled,
    }))
}

/// DELETE /job/{id}
///
/// Cancels the job if it is still running and removes its stored media
/// before dropping the record.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_job_id(&id)?;
    if !state.orchestrator.delete_job(id).await {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: id.to_string(),
        }));
    }

    tracing::info!(job_id = %id, "Job deleted via API");
    Ok(Json(json!({ "message": format!("Job {id} deleted successfully") })))
}
