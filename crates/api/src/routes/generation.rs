use axum::routing::post;
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Generation entry points.
///
/// ```text
/// POST /generate-video        -> generate_video (202, runs in background)
/// POST /generate-video-sync   -> generate_video_sync (waits for the result)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-video", post(generation::generate_video))
        .route("/generate-video-sync", post(generation::generate_video_sync))
}
