//! Per-job automation sessions.
//!
//! [`ResourceManager`] owns at most one live [`UiDriver`] per job. A slot is
//! reserved before the (slow) launch starts, so a second `acquire` for the
//! same job fails fast and a `release` that lands mid-launch is honoured:
//! the freshly launched session is closed instead of registered.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use flowgen_core::driver::{LaunchOptions, UiDriver, UiDriverFactory};
use flowgen_core::types::JobId;
use tokio::sync::Mutex;

use crate::error::ResourceError;

/// A live session bound to one job.
#[derive(Clone)]
pub struct ResourceHandle {
    pub job_id: JobId,
    pub driver: Arc<dyn UiDriver>,
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

enum Slot {
    Launching,
    Live(Arc<dyn UiDriver>),
}

/// Owns the active-session table.
pub struct ResourceManager {
    factory: Arc<dyn UiDriverFactory>,
    slots: Mutex<HashMap<JobId, Slot>>,
}

impl ResourceManager {
    pub fn new(factory: Arc<dyn UiDriverFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Launch and register a session for `job_id`.
    pub async fn acquire(
        &self,
        job_id: JobId,
        options: &LaunchOptions,
    ) -> Result<ResourceHandle, ResourceError> {
        {
            let mut slots = self.slots.lock().await;
            if slots.contains_key(&job_id) {
                return Err(ResourceError::AlreadyActive(job_id));
            }
            slots.insert(job_id, Slot::Launching);
        }

        let driver: Arc<dyn UiDriver> = match self.factory.launch(job_id, options).await {
            Ok(driver) => Arc::from(driver),
            Err(e) => {
                let mut slots = self.slots.lock().await;
                if matches!(slots.get(&job_id), Some(Slot::Launching)) {
                    slots.remove(&job_id);
                }
                return Err(ResourceError::Launch(e.to_string()));
            }
        };

        let registered = {
            let mut slots = self.slots.lock().await;
            match slots.get_mut(&job_id) {
                Some(slot @ Slot::Launching) => {
                    *slot = Slot::Live(Arc::clone(&driver));
                    true
                }
                _ => false,
            }
        };

        if !registered {
            tracing::info!(%job_id, "Job released during launch, closing new session");
            close_driver(job_id, driver.as_ref()).await;
            return Err(ResourceError::Released(job_id));
        }

        tracing::info!(%job_id, "Session acquired");
        Ok(ResourceHandle { job_id, driver })
    }

    /// Close and forget the session for `job_id`.
    ///
    /// Safe to call any number of times; returns whether anything was
    /// released by this call.
    pub async fn release(&self, job_id: JobId) -> bool {
        let slot = self.slots.lock().await.remove(&job_id);
        match slot {
            Some(Slot::Live(driver)) => {
                close_driver(job_id, driver.as_ref()).await;
                tracing::info!(%job_id, "Session released");
                true
            }
            Some(Slot::Launching) => {
                tracing::info!(%job_id, "Session released before launch finished");
                true
            }
            None => false,
        }
    }

    /// External cancellation: release the job's session if it has one.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        self.release(job_id).await
    }

    pub async fn active_job_ids(&self) -> HashSet<JobId> {
        self.slots.lock().await.keys().copied().collect()
    }

    pub async fn active_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Release every outstanding session.
    pub async fn shutdown(&self) {
        let ids = self.active_job_ids().await;
        tracing::info!(count = ids.len(), "Releasing all sessions");
        for job_id in ids {
            self.release(job_id).await;
        }
    }
}

/// Close errors are logged, never propagated: the slot is already gone.
async fn close_driver(job_id: JobId, driver: &dyn UiDriver) {
    if let Err(e) = driver.close().await {
        tracing::warn!(%job_id, error = %e, "Failed to close session cleanly");
    }
}
