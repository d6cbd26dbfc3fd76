use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::event::ServiceRequestStatus;

use super::ResolutionConfig;

#[derive(Debug, Error)]
pub enum StatusApiError {
    #[error("status API rate limit reached")]
    RateLimited,

    #[error("status API connection failed: {0}")]
    ConnectionFailed(String),

    #[error("status API request timed out")]
    Timeout,

    #[error("status API error: {0}")]
    ApiError(String),
}

/// External service request status lookup.
#[async_trait]
pub trait StatusApi: Send + Sync {
    async fn get_status(&self, request_number: &str) -> Result<ServiceRequestStatus, StatusApiError>;
}

pub struct HttpStatusApi {
    client: Client,
    config: ResolutionConfig,
}

impl HttpStatusApi {
    pub fn new(config: ResolutionConfig) -> Result<Self, StatusApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StatusApiError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl StatusApi for HttpStatusApi {
    async fn get_status(&self, request_number: &str) -> Result<ServiceRequestStatus, StatusApiError> {
        let response = self
            .client
            .get(&self.config.url)
            .query(&[("srnumber", request_number)])
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header("Ocp-Apim-Subscription-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StatusApiError::Timeout
                } else if e.is_connect() {
                    StatusApiError::ConnectionFailed(e.to_string())
                } else {
                    StatusApiError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StatusApiError::RateLimited);
        }

        // Any other response carrying a status document is accepted as is.
        response.json().await.map_err(|e| {
            StatusApiError::ApiError(format!("HTTP {}: failed to parse status: {}", status, e))
        })
    }
}
