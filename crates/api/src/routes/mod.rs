pub mod cookies;
pub mod generation;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Every route except health, mounted at the root.
///
/// ```text
/// POST   /generate-video        -> generation::generate_video
/// POST   /generate-video-sync   -> generation::generate_video_sync
/// GET    /jobs                  -> jobs::list_jobs
/// GET    /job/{id}              -> jobs::get_job
/// DELETE /job/{id}              -> jobs::delete_job
/// POST   /job/{id}/cancel       -> jobs::cancel_job
/// POST   /upload-cookies        -> cookies::upload_cookies
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generation::router())
        .merge(jobs::router())
        .merge(cookies::router())
}
