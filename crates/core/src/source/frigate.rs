//! Frigate NVR HTTP client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::event::Event;

use super::{EventQuery, EventSource, SourceError};

/// HTTP client for the Frigate events API.
pub struct FrigateClient {
    client: Client,
    config: SourceConfig,
}

impl FrigateClient {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn event_url(&self, event_id: &str) -> String {
        format!(
            "{}/api/events/{}",
            self.base_url(),
            urlencoding::encode(event_id)
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
        let response = request.send().await.map_err(map_request_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response)
    }
}

fn map_request_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else if e.is_connect() {
        SourceError::ConnectionFailed(e.to_string())
    } else {
        SourceError::ApiError(e.to_string())
    }
}

#[async_trait]
impl EventSource for FrigateClient {
    fn name(&self) -> &str {
        "frigate"
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, SourceError> {
        let url = format!("{}/api/events", self.base_url());
        let response = self.send(self.client.get(&url).query(query)).await?;

        let events: Vec<Event> = response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse events: {}", e)))?;
        debug!(count = events.len(), "Frigate events fetched");
        Ok(events)
    }

    async fn event_document(&self, event_id: &str) -> Result<serde_json::Value, SourceError> {
        let response = self.send(self.client.get(self.event_url(event_id))).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse event {}: {}", event_id, e)))
    }

    async fn download_clip(&self, event_id: &str, dest: &Path) -> Result<u64, SourceError> {
        let url = format!("{}/clip.mp4", self.event_url(event_id));
        let response = self.send(self.client.get(&url)).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_request_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), SourceError> {
        self.send(self.client.delete(self.event_url(event_id)))
            .await?;
        info!(event_id, "Deleted event from source");
        Ok(())
    }
}
