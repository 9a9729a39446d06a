use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flowgen_api::config::{ServerConfig, StorageBackend};
use flowgen_api::router::build_app_router;
use flowgen_api::state::AppState;
use flowgen_core::store::DurableStore;
use flowgen_driver::cookies::load_cookie_file;
use flowgen_driver::WebDriverFactory;
use flowgen_events::{EventBus, EventLog};
use flowgen_pipeline::fetch::HttpFetcher;
use flowgen_pipeline::{
    ArtifactPipeline, JobOrchestrator, JobRegistry, ProgressMonitor, ResourceManager,
};
use flowgen_storage::{MemoryStore, S3Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "flowgen_api=debug,flowgen_pipeline=debug,flowgen_driver=info,tower_http=debug".into()
    });
    let subscriber = tracing_subscriber::registry().with(filter);
    if config.log_json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Durable store ---
    let store: Arc<dyn DurableStore> = match config.storage_backend {
        StorageBackend::S3 => Arc::new(
            S3Store::connect(&config.s3_config())
                .await
                .expect("Failed to configure S3 store"),
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; artifacts are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let fetcher = Arc::new(
        HttpFetcher::new(Duration::from_secs(config.download_timeout_secs))
            .expect("Failed to build download client"),
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let log_handle = tokio::spawn(EventLog::run(event_bus.subscribe()));
    tracing::info!("Event bus created, event log started");

    // --- Orchestration ---
    let factory = Arc::new(WebDriverFactory::new(config.webdriver_config()));
    let registry = Arc::new(JobRegistry::new(Arc::clone(&event_bus)));
    let resources = Arc::new(ResourceManager::new(factory));
    let orchestrator = Arc::new(JobOrchestrator::new(
        registry,
        resources,
        ProgressMonitor::new(config.monitor_config()),
        ArtifactPipeline::new(store, fetcher, config.artifact_namespace.clone()),
        config.orchestrator_config(),
    ));
    tracing::info!(webdriver = %config.webdriver_url, "Job orchestrator ready");

    // --- Default cookies ---
    let default_cookies = match &config.cookies_file {
        Some(path) => match load_cookie_file(path).await {
            Ok(cookies) => Some(cookies),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "No default cookies loaded");
                None
            }
        },
        None => None,
    };

    // --- App state ---
    let state = AppState::new(
        Arc::new(config.clone()),
        Arc::clone(&orchestrator),
        Arc::clone(&event_bus),
        default_cookies,
    );
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Cancel in-flight jobs and close every browser session.
    orchestrator
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!("Job orchestrator shut down");

    // Dropping the last bus sender closes the channel and ends the event log.
    drop(orchestrator);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), log_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
