//! Browser-export cookie loading and normalisation.
//!
//! Accepts the JSON produced by common cookie-export extensions (an array of
//! cookie objects, or an object with a `cookies` array) and reduces each
//! entry to the attributes a WebDriver session accepts.

use std::path::Path;

use flowgen_core::driver::SessionCookie;
use serde::Deserialize;

/// Errors while reading or parsing a cookie set.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("Cookie file {path} could not be read: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid cookie JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cookie set: {0}")]
    Invalid(String),
}

/// One entry as exported by the browser.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCookie {
    name: String,
    value: String,
    domain: String,
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    http_only: bool,
    same_site: Option<String>,
    /// Exports mark cookies without an expiry as session cookies.
    #[serde(default = "default_session")]
    session: bool,
    expiration_date: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_session() -> bool {
    true
}

/// Map an exported `sameSite` value onto `Strict`, `Lax` or `None`.
///
/// `unspecified`, missing and unknown values become `Lax`; Chrome's
/// `no_restriction` is `None`.
pub fn normalize_same_site(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("strict") => "Strict",
        Some("none") | Some("no_restriction") => "None",
        _ => "Lax",
    }
}

fn normalize(raw: RawCookie) -> SessionCookie {
    let expiry = if raw.session {
        None
    } else {
        raw.expiration_date.map(|e| e as i64)
    };

    SessionCookie {
        name: raw.name,
        value: raw.value,
        domain: raw.domain,
        path: raw.path,
        secure: raw.secure,
        http_only: raw.http_only,
        same_site: normalize_same_site(raw.same_site.as_deref()).to_string(),
        expiry,
    }
}

/// Parse and normalise a cookie set from already-decoded JSON.
pub fn parse_cookies(value: &serde_json::Value) -> Result<Vec<SessionCookie>, CookieError> {
    let entries = match value {
        serde_json::Value::Array(_) => value.clone(),
        serde_json::Value::Object(map) => map.get("cookies").cloned().ok_or_else(|| {
            CookieError::Invalid("expected an array or an object with a `cookies` array".into())
        })?,
        _ => {
            return Err(CookieError::Invalid(
                "expected an array or an object with a `cookies` array".into(),
            ))
        }
    };

    let raw: Vec<RawCookie> = serde_json::from_value(entries)?;
    Ok(raw.into_iter().map(normalize).collect())
}

/// Parse and normalise a cookie set from raw bytes (an uploaded file).
pub fn parse_cookie_bytes(bytes: &[u8]) -> Result<Vec<SessionCookie>, CookieError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    parse_cookies(&value)
}

/// Load a cookie set from `path`.
pub async fn load_cookie_file(path: impl AsRef<Path>) -> Result<Vec<SessionCookie>, CookieError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| CookieError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let cookies = parse_cookie_bytes(&bytes)?;

    tracing::info!(path = %path.display(), count = cookies.len(), "Loaded cookie file");
    if let Some(email) = email_hint(&cookies) {
        tracing::info!(%email, "Cookie set belongs to account");
    }
    Ok(cookies)
}

/// The account e-mail carried by the cookie set, if any.
pub fn email_hint(cookies: &[SessionCookie]) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.name == "email" || c.name == "EMAIL")
        .map(|c| c.value.trim_matches('"').replace("%40", "@"))
}

/// WebDriver JSON for one cookie.
pub fn to_webdriver_json(cookie: &SessionCookie) -> serde_json::Value {
    let mut json = serde_json::json!({
        "name": cookie.name,
        "value": cookie.value,
        "domain": cookie.domain,
        "path": cookie.path,
        "secure": cookie.secure,
        "httpOnly": cookie.http_only,
        "sameSite": cookie.same_site,
    });
    if let Some(expiry) = cookie.expiry {
        json["expiry"] = serde_json::json!(expiry);
    }
    json
}
