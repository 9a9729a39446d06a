use axum::routing::post;
use axum::Router;

use crate::handlers::cookies;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/upload-cookies", post(cookies::upload_cookies))
}
