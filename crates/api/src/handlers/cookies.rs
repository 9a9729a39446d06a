//! Default cookie set upload.

use axum::extract::{Multipart, State};
use axum::Json;
use flowgen_driver::cookies::{email_hint, parse_cookie_bytes};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CookieUploadResponse {
    pub message: String,
    pub cookie_count: usize,
}

/// POST /upload-cookies
///
/// Multipart form with a `file` field holding browser-export cookie JSON.
/// Replaces the cookie set used by requests that carry none.
pub async fn upload_cookies(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<CookieUploadResponse>> {
    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            data = Some(bytes);
            break;
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;
    let cookies = parse_cookie_bytes(&data)
        .map_err(|e| AppError::BadRequest(format!("Invalid cookie file: {e}")))?;
    if cookies.is_empty() {
        return Err(AppError::BadRequest("Cookie file contains no cookies".to_string()));
    }

    let cookie_count = cookies.len();
    match email_hint(&cookies) {
        Some(email) => tracing::info!(cookie_count, %email, "Default cookies replaced"),
        None => tracing::info!(cookie_count, "Default cookies replaced"),
    }
    *state.default_cookies.write().await = Some(cookies);

    Ok(Json(CookieUploadResponse {
        message: "Cookies uploaded successfully".to_string(),
        cookie_count,
    }))
}
