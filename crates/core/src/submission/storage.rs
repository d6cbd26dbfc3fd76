//! Object storage capability, used as the attachment fallback.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use super::ObjectStorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("object storage connection failed: {0}")]
    ConnectionFailed(String),

    #[error("object storage request timed out")]
    Timeout,

    #[error("object storage API error: {0}")]
    ApiError(String),

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload the file at `path` under `key`, returning its public URL.
    async fn upload(&self, key: &str, path: &Path) -> Result<String, StorageError>;
}

/// Uploads by HTTP `PUT <endpoint>/<key>` with a bearer token.
pub struct HttpObjectStorage {
    client: Client,
    config: ObjectStorageConfig,
}

impl HttpObjectStorage {
    pub fn new(config: ObjectStorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.config.public_base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, key: &str, path: &Path) -> Result<String, StorageError> {
        let body = tokio::fs::read(path).await?;
        let url = format!("{}/{}", self.config.endpoint.trim_end_matches('/'), key);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout
                } else if e.is_connect() {
                    StorageError::ConnectionFailed(e.to_string())
                } else {
                    StorageError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(StorageError::ApiError(format!("HTTP {}", response.status())));
        }

        let public = self.public_url(key);
        info!(key, url = %public, "Uploaded object");
        Ok(public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_joins_key() {
        let storage = HttpObjectStorage::new(ObjectStorageConfig {
            endpoint: "http://minio:9000/clips".to_string(),
            public_base_url: "https://clips.example.org/".to_string(),
            token: "t".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            storage.public_url("evt-1/clip.mp4"),
            "https://clips.example.org/evt-1/clip.mp4"
        );
    }
}
