//! Handlers that start generation jobs.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use flowgen_core::driver::SessionCookie;
use flowgen_core::types::JobId;
use flowgen_driver::cookies::parse_cookies;
use flowgen_pipeline::GenerationRequest;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn default_headless() -> bool {
    true
}

/// Body of both generation endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateVideoRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Prompt must be between 1 and 2000 characters"
    ))]
    pub prompt: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Browser-export cookie JSON (array or `{"cookies": [...]}`).
    #[serde(default)]
    pub cookies: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct GenerationAccepted {
    pub job_id: JobId,
    pub status: &'static str,
    pub message: &'static str,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    pub job_id: JobId,
    pub prompt: String,
    pub videos: Vec<String>,
    pub images: Vec<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate the body and resolve which cookies the run should use.
async fn prepare(state: &AppState, mut input: GenerateVideoRequest) -> AppResult<GenerationRequest> {
    input.prompt = input.prompt.trim().to_string();
    input.validate()?;

    let cookies: Vec<SessionCookie> = match &input.cookies {
        Some(raw) => parse_cookies(raw).map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => state
            .default_cookies
            .read()
            .await
            .clone()
            .unwrap_or_default(),
    };
    if cookies.is_empty() {
        tracing::warn!("Starting generation without cookies; the session will likely be signed out");
    }

    Ok(GenerationRequest {
        prompt: input.prompt,
        headless: input.headless,
        cookies,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /generate-video
///
/// Accept the request and run it in the background. Poll `GET /job/{id}`
/// for the outcome.
pub async fn generate_video(
    State(state): State<AppState>,
    Json(input): Json<GenerateVideoRequest>,
) -> AppResult<(StatusCode, Json<GenerationAccepted>)> {
    let request = prepare(&state, input).await?;
    let prompt = request.prompt.clone();
    let job_id = state.orchestrator.submit(request).await;

    tracing::info!(%job_id, "Generation accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerationAccepted {
            job_id,
            status: "pending",
            message: "Video generation started. Use /job/{job_id} to check status.",
            prompt,
        }),
    ))
}

/// POST /generate-video-sync
///
/// Run the whole job before responding. A failed job is a 500 with code
/// `GENERATION_FAILED`.
pub async fn generate_video_sync(
    State(state): State<AppState>,
    Json(input): Json<GenerateVideoRequest>,
) -> AppResult<Json<GenerationResult>> {
    let request = prepare(&state, input).await?;
    let (job_id, result) = state.orchestrator.run_sync(request).await;
    let job = result.map_err(AppError::GenerationFailed)?;

    tracing::info!(%job_id, videos = job.videos.len(), "Synchronous generation finished");

    Ok(Json(GenerationResult {
        success: true,
        job_id,
        videos: job.video_urls(),
        images: job.image_urls(),
        prompt: job.prompt,
    }))
}
