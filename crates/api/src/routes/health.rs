use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Service banner.
#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Browser sessions currently held by jobs.
    pub active_sessions: usize,
    /// Jobs whose task has not finished.
    pub active_jobs: usize,
}

/// GET / -- identifies the service.
async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "flowgen",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health -- returns service health and current load.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_sessions = state.orchestrator.resources().active_count().await;
    let active_jobs = state.orchestrator.active_jobs().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions,
        active_jobs,
    })
}

/// Mount health check routes at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
