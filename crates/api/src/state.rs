use std::sync::Arc;

use flowgen_core::driver::SessionCookie;
use flowgen_events::EventBus;
use flowgen_pipeline::JobOrchestrator;
use tokio::sync::RwLock;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Runs jobs; also owns the registry and the session manager.
    pub orchestrator: Arc<JobOrchestrator>,
    pub event_bus: Arc<EventBus>,
    /// Cookie set applied to requests that carry none. Seeded from
    /// `COOKIES_FILE` at startup, replaced by `POST /upload-cookies`.
    pub default_cookies: Arc<RwLock<Option<Vec<SessionCookie>>>>,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        orchestrator: Arc<JobOrchestrator>,
        event_bus: Arc<EventBus>,
        default_cookies: Option<Vec<SessionCookie>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            event_bus,
            default_cookies: Arc::new(RwLock::new(default_cookies)),
        }
    }
}
