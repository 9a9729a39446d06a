//! S3-backed durable store.
//!
//! The bucket is configured once (`S3_BUCKET`) and every upload goes to it;
//! public URLs are derived from the same configuration.

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use flowgen_core::store::{DurableStore, StoreError};

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Endpoint override for S3-compatible services (MinIO, R2, ...).
    /// Switches the client to path-style addressing.
    pub endpoint_url: Option<String>,
    /// Prefix for public object URLs. Defaults to the virtual-hosted AWS URL.
    pub public_base_url: Option<String>,
    /// Static credentials. When absent the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3Store {
    /// Build a client from `config`.
    pub async fn connect(config: &S3Config) -> Result<Self, StoreError> {
        if config.bucket.trim().is_empty() {
            return Err(StoreError::Config("S3 bucket name is empty".into()));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "flowgen-env",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let public_base_url = public_base_url(config);
        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            public_base_url = %public_base_url,
            "S3 store configured",
        );

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL of `key` in this store.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

/// Resolve the URL prefix objects are served from.
fn public_base_url(config: &S3Config) -> String {
    if let Some(base) = &config.public_base_url {
        return base.trim_end_matches('/').to_string();
    }
    match &config.endpoint_url {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", config.bucket, config.region),
    }
}

#[async_trait]
impl DurableStore for S3Store {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key, size, content_type, "Object uploaded");
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key, "Object deleted");
        Ok(())
    }
}
