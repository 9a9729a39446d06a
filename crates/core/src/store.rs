//! Durable object storage seam.

use async_trait::async_trait;

/// Errors from a durable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("Delete of {key} failed: {message}")]
    Delete { key: String, message: String },

    #[error("Store misconfigured: {0}")]
    Config(String),
}

/// Write-once object storage with publicly resolvable URLs.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store `bytes` under `key` and return the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StoreError>;

    /// Remove the object at `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
