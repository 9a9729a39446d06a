//! In-memory durable store.

use std::collections::HashMap;

use async_trait::async_trait;
use flowgen_core::store::{DurableStore, StoreError};
use tokio::sync::RwLock;

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in a map and serves them under `memory://<key>` (or a
/// configured base URL).
pub struct MemoryStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    /// Keys whose upload should fail, for exercising partial-failure paths.
    failing_keys: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            failing_keys: RwLock::new(Vec::new()),
        }
    }

    /// Make every later `put` whose key ends with `suffix` fail.
    pub async fn fail_uploads_ending_with(&self, suffix: impl Into<String>) {
        self.failing_keys.write().await.push(suffix.into());
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        if self
            .failing_keys
            .read()
            .await
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()))
        {
            return Err(StoreError::Upload {
                key: key.to_string(),
                message: "rejected by memory store".into(),
            });
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(join_url(&self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

/// `memory://` + `k` is `memory://k`; `https://h/` + `k` is `https://h/k`.
fn join_url(base: &str, key: &str) -> String {
    if base.ends_with("//") {
        format!("{base}{key}")
    } else {
        format!("{}/{key}", base.trim_end_matches('/'))
    }
}
