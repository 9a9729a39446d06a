//! Route definitions for job records.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// ```text
/// GET    /jobs              -> list_jobs
/// GET    /job/{id}          -> get_job
/// DELETE /job/{id}          -> delete_job
/// POST   /job/{id}/cancel   -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/job/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/job/{id}/cancel", post(jobs::cancel_job))
}
