//! WebDriver-backed [`UiDriver`] for the Flow tool.

use std::time::Duration;

use async_trait::async_trait;
use flowgen_core::artifact::ArtifactReference;
use flowgen_core::driver::{
    DriverError, LaunchOptions, ProbeStrategy, SessionCookie, UiDriver, UiDriverFactory,
};
use flowgen_core::types::JobId;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::cookies::to_webdriver_json;
use crate::selectors::FlowSelectors;
use crate::webdriver::{Locator, WebDriverClient, WebDriverError, KEY_ENTER};

/// Attempts at clicking the submit button when Enter did not work.
const SUBMIT_ATTEMPTS: u32 = 3;

/// Endpoint, pages and timings for WebDriver sessions.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub webdriver_url: String,
    /// Landing page; cookies are installed here and it is the navigation fallback.
    pub entry_url: String,
    /// The generation tool itself.
    pub tool_url: String,
    /// Per-command HTTP timeout.
    pub request_timeout: Duration,
    pub selectors: FlowSelectors,
    /// Time allowed for a selector to appear before giving up on it.
    pub element_wait: Duration,
    /// Pause after page transitions for client-side rendering.
    pub settle: Duration,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            entry_url: "https://labs.google".into(),
            tool_url: "https://labs.google/fx/tools/flow".into(),
            request_timeout: Duration::from_secs(30),
            selectors: FlowSelectors::default(),
            element_wait: Duration::from_secs(10),
            settle: Duration::from_secs(3),
        }
    }
}

fn transport(err: WebDriverError) -> DriverError {
    match err {
        WebDriverError::Command {
            status, message, ..
        } => DriverError::Command { status, message },
        other => DriverError::Transport(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One browser session bound to a job.
pub struct WebDriverSession {
    job_id: JobId,
    /// `None` once closed.
    client: Mutex<Option<WebDriverClient>>,
    config: WebDriverConfig,
    cookies: Vec<SessionCookie>,
}

impl WebDriverSession {
    /// The live client, or [`DriverError::Closed`] after `close`.
    async fn live(&self) -> Result<MappedMutexGuard<'_, WebDriverClient>, DriverError> {
        MutexGuard::try_map(self.client.lock().await, |c| c.as_mut()).map_err(|_| DriverError::Closed)
    }

    /// Install the job's cookies on the current document's domain.
    /// Individual rejections are logged and skipped.
    async fn install_cookies(&self, client: &WebDriverClient) {
        if self.cookies.is_empty() {
            return;
        }
        let mut installed = 0usize;
        for cookie in &self.cookies {
            match client.add_cookie(&to_webdriver_json(cookie)).await {
                Ok(()) => installed += 1,
                Err(e) => tracing::debug!(
                    job_id = %self.job_id,
                    cookie = %cookie.name,
                    error = %e,
                    "Cookie rejected",
                ),
            }
        }
        tracing::info!(job_id = %self.job_id, installed, total = self.cookies.len(), "Cookies installed");
    }

    async fn open_tool(&self, client: &WebDriverClient) -> Result<(), WebDriverError> {
        client.goto(&self.config.entry_url).await?;
        self.install_cookies(client).await;
        client.goto(&self.config.tool_url).await?;
        tokio::time::sleep(self.config.settle).await;
        Ok(())
    }

    /// Wait for `locator`, then click it if it is displayed and enabled.
    async fn click_when_ready(
        &self,
        client: &WebDriverClient,
        locator: Locator<'_>,
    ) -> Result<bool, WebDriverError> {
        let Some(element) = client.wait_for(locator, self.config.element_wait).await? else {
            tracing::debug!(job_id = %self.job_id, %locator, "Element not found");
            return Ok(false);
        };
        if !client.is_interactable(&element).await? {
            tracing::debug!(job_id = %self.job_id, %locator, "Element not interactable");
            return Ok(false);
        }
        client.click(&element).await?;
        Ok(true)
    }

    async fn type_prompt(&self, client: &WebDriverClient, prompt: &str) -> Result<bool, WebDriverError> {
        let textarea = Locator::Css(&self.config.selectors.prompt_textarea);
        let Some(element) = client.wait_for(textarea, self.config.element_wait).await? else {
            tracing::warn!(job_id = %self.job_id, "Prompt textarea not found");
            return Ok(false);
        };
        if !client.is_interactable(&element).await? {
            tracing::warn!(job_id = %self.job_id, "Prompt textarea not ready");
            return Ok(false);
        }
        client.click(&element).await?;
        client.clear(&element).await?;
        client.send_keys(&element, prompt).await?;
        Ok(true)
    }

    async fn press_enter(&self, client: &WebDriverClient) -> Result<bool, WebDriverError> {
        let textarea = Locator::Css(&self.config.selectors.prompt_textarea);
        let Some(element) = client.wait_for(textarea, self.config.element_wait).await? else {
            return Ok(false);
        };
        client.send_keys(&element, KEY_ENTER).await?;
        tokio::time::sleep(self.config.settle).await;
        Ok(true)
    }

    async fn click_submit(&self, client: &WebDriverClient) -> bool {
        let button = Locator::Css(&self.config.selectors.submit_button);
        for attempt in 1..=SUBMIT_ATTEMPTS {
            match self.click_when_ready(client, button).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(job_id = %self.job_id, attempt, error = %e, "Submit click failed")
                }
            }
            if attempt < SUBMIT_ATTEMPTS {
                tokio::time::sleep(self.config.settle).await;
            }
        }
        false
    }
}

#[async_trait]
impl UiDriver for WebDriverSession {
    async fn navigate(&self) -> Result<(), DriverError> {
        let client = self.live().await?;
        match self.open_tool(&client).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Tool page failed, falling back to entry page");
                client.goto(&self.config.entry_url).await.map_err(transport)
            }
        }
    }

    async fn check_authenticated(&self) -> Result<bool, DriverError> {
        let client = self.live().await?;
        tokio::time::sleep(self.config.settle).await;
        for selector in &self.config.selectors.auth_indicators {
            let found = client
                .find_all(Locator::Css(selector))
                .await
                .map_err(transport)?;
            if !found.is_empty() {
                tracing::debug!(job_id = %self.job_id, %selector, "Authentication indicator found");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn create_project(&self) -> Result<bool, DriverError> {
        let client = self.live().await?;
        let selectors = &self.config.selectors;
        if self
            .click_when_ready(&client, Locator::Css(&selectors.new_project_button))
            .await
            .map_err(transport)?
        {
            return Ok(true);
        }
        tracing::debug!(job_id = %self.job_id, "Exact new-project selector missed, trying label");
        self.click_when_ready(&client, Locator::XPath(&selectors.new_project_by_text))
            .await
            .map_err(transport)
    }

    async fn submit_prompt(&self, prompt: &str) -> Result<bool, DriverError> {
        let client = self.live().await?;
        if !self.type_prompt(&client, prompt).await.map_err(transport)? {
            return Ok(false);
        }
        match self.press_enter(&client).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => tracing::debug!(job_id = %self.job_id, error = %e, "Enter key submit failed"),
        }
        Ok(self.click_submit(&client).await)
    }

    async fn query_progress_probe(
        &self,
        strategy: &ProbeStrategy,
    ) -> Result<Vec<String>, DriverError> {
        let client = self.live().await?;
        let elements = client
            .find_all(Locator::Css(&strategy.selector))
            .await
            .map_err(transport)?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in &elements {
            texts.push(client.text(element).await.map_err(transport)?);
        }
        Ok(texts)
    }

    async fn discover_artifacts(&self) -> Result<Vec<ArtifactReference>, DriverError> {
        let client = self.live().await?;
        let videos = client
            .find_all(Locator::Css(&self.config.selectors.generated_video))
            .await
            .map_err(transport)?;

        let mut refs = Vec::with_capacity(videos.len());
        for (i, element) in videos.iter().enumerate() {
            let index = i as u32 + 1;
            let Some(src) = client.attribute(element, "src").await.map_err(transport)? else {
                tracing::debug!(job_id = %self.job_id, index, "Video without src skipped");
                continue;
            };
            let poster = client
                .attribute(element, "poster")
                .await
                .map_err(transport)?
                .filter(|p| !p.is_empty());
            refs.push(ArtifactReference::video(index, src, poster));
        }
        Ok(refs)
    }

    async fn close(&self) -> Result<(), DriverError> {
        let Some(client) = self.client.lock().await.take() else {
            return Ok(());
        };
        client.quit().await.map_err(transport)?;
        tracing::debug!(job_id = %self.job_id, session_id = client.session_id(), "Browser session closed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Starts one [`WebDriverSession`] per job.
pub struct WebDriverFactory {
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UiDriverFactory for WebDriverFactory {
    async fn launch(
        &self,
        job_id: JobId,
        options: &LaunchOptions,
    ) -> Result<Box<dyn UiDriver>, DriverError> {
        let client = WebDriverClient::start(
            &self.config.webdriver_url,
            options.headless,
            self.config.request_timeout,
        )
        .await
        .map_err(|e| DriverError::Launch(e.to_string()))?;

        tracing::info!(
            %job_id,
            session_id = client.session_id(),
            headless = options.headless,
            cookies = options.cookies.len(),
            "Browser session started",
        );

        Ok(Box::new(WebDriverSession {
            job_id,
            client: Mutex::new(Some(client)),
            config: self.config.clone(),
            cookies: options.cookies.clone(),
        }))
    }
}
