use std::str::FromStr;
use std::time::Duration;

use flowgen_driver::selectors::{default_probe_strategies, FlowSelectors};
use flowgen_driver::WebDriverConfig;
use flowgen_pipeline::{AuthPolicy, MonitorConfig, OrchestratorConfig};
use flowgen_storage::S3Config;

/// Where ingested artifacts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    /// Process-local map; artifacts vanish on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the S3
/// bucket, which is required when the S3 backend is selected.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must outlast a synchronous generation.
    pub request_timeout_secs: u64,
    /// Grace period for in-flight jobs on shutdown.
    pub shutdown_timeout_secs: u64,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,

    // -- Automation --
    pub webdriver_url: String,
    pub flow_entry_url: String,
    pub flow_tool_url: String,
    pub driver_request_timeout_secs: u64,
    /// Cookie file used when a request carries no cookies and none were uploaded.
    pub cookies_file: Option<String>,
    pub require_authentication: bool,

    // -- Monitoring --
    pub poll_interval_secs: u64,
    pub poll_deadline_secs: u64,
    pub completion_grace_secs: u64,
    pub min_artifacts_for_completion: usize,
    pub project_settle_secs: u64,

    // -- Storage --
    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint_url: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub storage_public_base_url: Option<String>,
    pub artifact_namespace: String,
    pub download_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                             |
    /// |--------------------------------|-------------------------------------|
    /// | `HOST`                         | `0.0.0.0`                           |
    /// | `PORT`                         | `8000`                              |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`             |
    /// | `REQUEST_TIMEOUT_SECS`         | `600`                               |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                                |
    /// | `LOG_FORMAT`                   | `text` (`json` for JSON lines)      |
    /// | `WEBDRIVER_URL`                | `http://localhost:9515`             |
    /// | `FLOW_ENTRY_URL`               | `https://labs.google`               |
    /// | `FLOW_TOOL_URL`                | `https://labs.google/fx/tools/flow` |
    /// | `DRIVER_REQUEST_TIMEOUT_SECS`  | `30`                                |
    /// | `COOKIES_FILE`                 | `labs.google_cookies.json`          |
    /// | `REQUIRE_AUTHENTICATION`       | `false`                             |
    /// | `POLL_INTERVAL_SECS`           | `2`                                 |
    /// | `POLL_DEADLINE_SECS`           | `300`                               |
    /// | `COMPLETION_GRACE_SECS`        | `3`                                 |
    /// | `MIN_ARTIFACTS_FOR_COMPLETION` | `2`                                 |
    /// | `PROJECT_SETTLE_SECS`          | `5`                                 |
    /// | `STORAGE_BACKEND`              | `s3`                                |
    /// | `S3_BUCKET`                    | required for `s3`                   |
    /// | `S3_REGION`                    | `us-east-1`                         |
    /// | `S3_ENDPOINT_URL`              | unset                               |
    /// | `S3_ACCESS_KEY_ID`             | unset (AWS provider chain)          |
    /// | `S3_SECRET_ACCESS_KEY`         | unset (AWS provider chain)          |
    /// | `STORAGE_PUBLIC_BASE_URL`      | unset                               |
    /// | `ARTIFACT_NAMESPACE`           | `videos`                            |
    /// | `DOWNLOAD_TIMEOUT_SECS`        | `120`                               |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", "8000");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend: StorageBackend = parse_env("STORAGE_BACKEND", "s3");
        let s3_bucket = std::env::var("S3_BUCKET").unwrap_or_default();
        if storage_backend == StorageBackend::S3 && s3_bucket.trim().is_empty() {
            panic!("S3_BUCKET must be set when STORAGE_BACKEND=s3");
        }

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", "600"),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", "30"),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),

            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".into()),
            flow_entry_url: std::env::var("FLOW_ENTRY_URL")
                .unwrap_or_else(|_| "https://labs.google".into()),
            flow_tool_url: std::env::var("FLOW_TOOL_URL")
                .unwrap_or_else(|_| "https://labs.google/fx/tools/flow".into()),
            driver_request_timeout_secs: parse_env("DRIVER_REQUEST_TIMEOUT_SECS", "30"),
            cookies_file: optional_env("COOKIES_FILE")
                .or_else(|| Some("labs.google_cookies.json".into())),
            require_authentication: parse_env("REQUIRE_AUTHENTICATION", "false"),

            poll_interval_secs: parse_env("POLL_INTERVAL_SECS", "2"),
            poll_deadline_secs: parse_env("POLL_DEADLINE_SECS", "300"),
            completion_grace_secs: parse_env("COMPLETION_GRACE_SECS", "3"),
            min_artifacts_for_completion: parse_env("MIN_ARTIFACTS_FOR_COMPLETION", "2"),
            project_settle_secs: parse_env("PROJECT_SETTLE_SECS", "5"),

            storage_backend,
            s3_bucket,
            s3_region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            s3_endpoint_url: optional_env("S3_ENDPOINT_URL"),
            s3_access_key_id: optional_env("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: optional_env("S3_SECRET_ACCESS_KEY"),
            storage_public_base_url: optional_env("STORAGE_PUBLIC_BASE_URL"),
            artifact_namespace: std::env::var("ARTIFACT_NAMESPACE")
                .unwrap_or_else(|_| "videos".into()),
            download_timeout_secs: parse_env("DOWNLOAD_TIMEOUT_SECS", "120"),
        }
    }

    pub fn webdriver_config(&self) -> WebDriverConfig {
        WebDriverConfig {
            webdriver_url: self.webdriver_url.clone(),
            entry_url: self.flow_entry_url.clone(),
            tool_url: self.flow_tool_url.clone(),
            request_timeout: Duration::from_secs(self.driver_request_timeout_secs),
            selectors: FlowSelectors::default(),
            ..WebDriverConfig::default()
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            deadline: Duration::from_secs(self.poll_deadline_secs),
            completion_grace: Duration::from_secs(self.completion_grace_secs),
            min_artifacts: self.min_artifacts_for_completion,
            strategies: default_probe_strategies(),
            ..MonitorConfig::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            project_settle: Duration::from_secs(self.project_settle_secs),
            auth_policy: if self.require_authentication {
                AuthPolicy::Require
            } else {
                AuthPolicy::Proceed
            },
        }
    }

    pub fn s3_config(&self) -> S3Config {
        S3Config {
            bucket: self.s3_bucket.clone(),
            region: self.s3_region.clone(),
            endpoint_url: self.s3_endpoint_url.clone(),
            public_base_url: self.storage_public_base_url.clone(),
            access_key_id: self.s3_access_key_id.clone(),
            secret_access_key: self.s3_secret_access_key.clone(),
        }
    }
}

/// Parse `key` (or `default` when unset), panicking on malformed values.
fn parse_env<T>(key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
