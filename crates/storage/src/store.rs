//! Object store client.
//!
//! [`HttpObjectStore`] speaks the Supabase storage object API:
//! `PUT {url}/storage/v1/object/{bucket}/{key}` with a bearer token and
//! the raw bytes as body.

use async_trait::async_trait;
use comfyrun_core::config::StorageConfig;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// `STORAGE_URL` cannot serve as a base for object paths.
    #[error("invalid storage URL '{0}'")]
    InvalidUrl(String),

    /// The store answered with something other than 200.
    #[error("storage rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return a reference to the object.
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError>;
}

pub struct HttpObjectStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    /// `{url}/storage/v1/object/{bucket}/{key}`. The bucket and each
    /// `/`-separated key segment are percent-encoded, so `#`, `?` and
    /// `%` in a filename stay part of the object key.
    fn object_url(&self, key: &str) -> Result<reqwest::Url, StorageError> {
        let invalid = || StorageError::InvalidUrl(self.config.url.clone());
        let mut url = reqwest::Url::parse(&self.config.url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["storage", "v1", "object", self.config.bucket.as_str()])
            .extend(key.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let size = bytes.len();
        let response = self
            .client
            .put(self.object_url(key)?)
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if status != reqwest::StatusCode::OK {
            tracing::warn!(key, status = status.as_u16(), body = %body, "Storage upload rejected");
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(key, bytes = size, "Uploaded artifact to storage");
        Ok(object_reference(&body, &self.config.bucket, key))
    }
}

/// The store usually answers `{"Key": "<bucket>/<key>"}`. The body is
/// parsed best-effort; without a usable `Key` the reference is built
/// from the bucket and key.
fn object_reference(body: &str, bucket: &str, key: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("Key").and_then(|k| k.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("{bucket}/{key}"))
}
