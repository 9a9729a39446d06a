//! Minimal W3C WebDriver client.
//!
//! Covers the handful of commands the Flow session needs (session
//! lifecycle, navigation, element lookup, reading text/attributes, clicking,
//! typing, cookies) over plain JSON using [`reqwest`].

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

/// W3C web element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a3dd2a7b5d6";

/// WebDriver key code for Enter.
pub const KEY_ENTER: &str = "\u{E007}";

/// How an element is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
}

impl Locator<'_> {
    fn strategy(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        }
    }

    fn value(&self) -> &str {
        match self {
            Locator::Css(v) | Locator::XPath(v) => v,
        }
    }
}

impl std::fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} `{}`", self.strategy(), self.value())
    }
}

/// Opaque reference to an element in the remote page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(String);

/// Errors from the WebDriver layer.
#[derive(Debug, thiserror::Error)]
pub enum WebDriverError {
    /// The HTTP request itself failed (network, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The WebDriver endpoint answered with a non-2xx status.
    #[error("WebDriver error ({status}) {error}: {message}")]
    Command {
        status: u16,
        /// W3C error code, e.g. `no such element`.
        error: String,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected WebDriver response: {0}")]
    Protocol(String),
}

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Deserialize)]
struct ErrorValue {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// HTTP client bound to one WebDriver session.
pub struct WebDriverClient {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    /// Start a Chrome session on the WebDriver endpoint at `base_url`.
    ///
    /// Every command carries `request_timeout`.
    pub async fn start(
        base_url: &str,
        headless: bool,
        request_timeout: Duration,
    ) -> Result<Self, WebDriverError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{base_url}/session"))
            .json(&session_capabilities(headless))
            .send()
            .await?;
        let session: NewSession = Self::parse_response(response).await?;

        Ok(Self {
            client,
            base_url,
            session_id: session.session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Load `url` and wait for the page load strategy to settle.
    pub async fn goto(&self, url: &str) -> Result<(), WebDriverError> {
        let response = self
            .client
            .post(self.endpoint("url"))
            .json(&json!({ "url": url }))
            .send()
            .await?;
        Self::check_status(response).await
    }

    pub async fn current_url(&self) -> Result<String, WebDriverError> {
        let response = self.client.get(self.endpoint("url")).send().await?;
        Self::parse_response(response).await
    }

    /// All elements matching `locator`, in document order. Empty when none match.
    pub async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<ElementId>, WebDriverError> {
        let response = self
            .client
            .post(self.endpoint("elements"))
            .json(&json!({ "using": locator.strategy(), "value": locator.value() }))
            .send()
            .await?;
        let raw: Vec<serde_json::Map<String, serde_json::Value>> =
            Self::parse_response(response).await?;

        raw.into_iter()
            .map(|entry| {
                entry
                    .get(ELEMENT_KEY)
                    .and_then(|v| v.as_str())
                    .map(|id| ElementId(id.to_string()))
                    .ok_or_else(|| WebDriverError::Protocol("element reference missing".into()))
            })
            .collect()
    }

    /// Poll for the first element matching `locator` until `timeout` passes.
    pub async fn wait_for(
        &self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> Result<Option<ElementId>, WebDriverError> {
        let poll = Duration::from_millis(250);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(first) = self.find_all(locator).await?.into_iter().next() {
                return Ok(Some(first));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn text(&self, element: &ElementId) -> Result<String, WebDriverError> {
        let response = self
            .client
            .get(self.element_endpoint(element, "text"))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let response = self
            .client
            .get(self.element_endpoint(element, &format!("attribute/{name}")))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Displayed and enabled.
    pub async fn is_interactable(&self, element: &ElementId) -> Result<bool, WebDriverError> {
        let response = self
            .client
            .get(self.element_endpoint(element, "displayed"))
            .send()
            .await?;
        let displayed: bool = Self::parse_response(response).await?;
        if !displayed {
            return Ok(false);
        }
        let response = self
            .client
            .get(self.element_endpoint(element, "enabled"))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn click(&self, element: &ElementId) -> Result<(), WebDriverError> {
        let response = self
            .client
            .post(self.element_endpoint(element, "click"))
            .json(&json!({}))
            .send()
            .await?;
        Self::check_status(response).await
    }

    pub async fn clear(&self, element: &ElementId) -> Result<(), WebDriverError> {
        let response = self
            .client
            .post(self.element_endpoint(element, "clear"))
            .json(&json!({}))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Type `text` into the element (key codes such as [`KEY_ENTER`] allowed).
    pub async fn send_keys(&self, element: &ElementId, text: &str) -> Result<(), WebDriverError> {
        let response = self
            .client
            .post(self.element_endpoint(element, "value"))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Install a cookie for the current document's domain.
    pub async fn add_cookie(&self, cookie: &serde_json::Value) -> Result<(), WebDriverError> {
        let response = self
            .client
            .post(self.endpoint("cookie"))
            .json(&json!({ "cookie": cookie }))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// End the session and close the browser.
    pub async fn quit(&self) -> Result<(), WebDriverError> {
        let response = self
            .client
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    fn endpoint(&self, command: &str) -> String {
        format!("{}/session/{}/{}", self.base_url, self.session_id, command)
    }

    fn element_endpoint(&self, element: &ElementId, command: &str) -> String {
        format!(
            "{}/session/{}/element/{}/{}",
            self.base_url, self.session_id, element.0, command
        )
    }

    /// Return the response unchanged on success, or a
    /// [`WebDriverError::Command`] built from the W3C error body.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, WebDriverError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let (error, message) = match serde_json::from_str::<Envelope<ErrorValue>>(&body) {
                Ok(env) => (env.value.error, env.value.message),
                Err(_) => (String::new(), body),
            };
            return Err(WebDriverError::Command {
                status: status.as_u16(),
                error,
                message,
            });
        }
        Ok(response)
    }

    /// Parse the `value` member of a successful response.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, WebDriverError> {
        let response = Self::ensure_success(response).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.value)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), WebDriverError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Capabilities for a Chrome session sized like a desktop browser.
fn session_capabilities(headless: bool) -> serde_json::Value {
    let mut args = vec![
        "--window-size=1280,720".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        format!("--user-agent={}", crate::selectors::USER_AGENT),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "normal",
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}
