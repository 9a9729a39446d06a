#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use flowgen_api::config::{ServerConfig, StorageBackend};
use flowgen_api::router::build_app_router;
use flowgen_api::state::AppState;
use flowgen_driver::scripted::{Script, ScriptRecord, ScriptedFactory, SCRIPTED_MEDIA_BASE};
use flowgen_events::EventBus;
use flowgen_pipeline::fetch::StaticFetcher;
use flowgen_pipeline::{
    ArtifactPipeline, JobOrchestrator, JobRegistry, ProgressMonitor, ResourceManager,
};
use flowgen_storage::MemoryStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Build a test `ServerConfig` with safe defaults.
///
/// Polling is shortened to milliseconds and storage is in memory.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        log_json: false,
        webdriver_url: "http://127.0.0.1:9515".to_string(),
        flow_entry_url: "https://labs.google".to_string(),
        flow_tool_url: "https://labs.google/fx/tools/flow".to_string(),
        driver_request_timeout_secs: 5,
        cookies_file: None,
        require_authentication: false,
        poll_interval_secs: 0,
        poll_deadline_secs: 1,
        completion_grace_secs: 0,
        min_artifacts_for_completion: 2,
        project_settle_secs: 0,
        storage_backend: StorageBackend::Memory,
        s3_bucket: String::new(),
        s3_region: "us-east-1".to_string(),
        s3_endpoint_url: None,
        s3_access_key_id: None,
        s3_secret_access_key: None,
        storage_public_base_url: None,
        artifact_namespace: "videos".to_string(),
        download_timeout_secs: 5,
    }
}

/// Application under test plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub record: Arc<ScriptRecord>,
}

/// Build the full application router with all middleware layers on top of
/// the scripted driver, an in-memory store and static media.
pub fn build_test_app(script: Script) -> TestApp {
    let config = test_config();

    let factory = ScriptedFactory::new(script);
    let record = factory.record();
    let store = Arc::new(MemoryStore::new());
    let fetcher = (1..=4).fold(StaticFetcher::new(), |fetcher, i| {
        fetcher
            .with(format!("{SCRIPTED_MEDIA_BASE}/video_{i}.mp4"), b"mp4".to_vec())
            .with(format!("{SCRIPTED_MEDIA_BASE}/poster_{i}.jpg"), JPEG.to_vec())
    });

    let event_bus = Arc::new(EventBus::default());
    let mut monitor = config.monitor_config();
    monitor.poll_interval = Duration::from_millis(10);

    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::new(JobRegistry::new(Arc::clone(&event_bus))),
        Arc::new(ResourceManager::new(Arc::new(factory))),
        ProgressMonitor::new(monitor),
        ArtifactPipeline::new(store.clone(), Arc::new(fetcher), config.artifact_namespace.clone()),
        config.orchestrator_config(),
    ));

    let state = AppState::new(Arc::new(config.clone()), orchestrator, event_bus, None);
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        store,
        record,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_empty(&self, uri: &str) -> Response<Body> {
        self.send(Request::post(uri).body(Body::empty()).unwrap()).await
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
