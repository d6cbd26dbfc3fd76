//! Complaint portal capability.
//!
//! The portal is a two-phase form: [`ComplaintPortal::prepare`] fills the
//! form and attaches the clip without submitting anything, then
//! [`ComplaintPortal::confirm`] performs the externally visible submit.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::PortalConfig;

/// Everything needed to fill out one complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplaintDraft {
    pub event_id: String,
    pub address: String,
    pub description: String,
    pub incident_date: String,
    pub incident_date_time: String,
    /// Clip to attach; `None` when the description links to it instead.
    #[serde(skip)]
    pub attachment: Option<PathBuf>,
}

/// A filled-out form that has not been submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedComplaint {
    /// Portal-side handle for the open form.
    pub handle: String,
    pub event_id: String,
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("clip attachment failed: {0}")]
    AttachmentFailed(String),

    #[error("portal connection failed: {0}")]
    ConnectionFailed(String),

    #[error("portal request timed out")]
    Timeout,

    #[error("portal rejected the complaint: {0}")]
    Rejected(String),

    #[error("portal API error: {0}")]
    ApiError(String),

    #[error("failed to read attachment: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ComplaintPortal: Send + Sync {
    fn name(&self) -> &str;

    /// Fill the form for `draft`, attaching its clip if it has one.
    async fn prepare(&self, draft: &ComplaintDraft) -> Result<PreparedComplaint, PortalError>;

    /// Submit a prepared form. Returns the confirmed request number.
    async fn confirm(&self, prepared: &PreparedComplaint) -> Result<String, PortalError>;

    /// Abandon a prepared form without submitting it.
    async fn discard(&self, prepared: &PreparedComplaint) -> Result<(), PortalError>;
}

/// Client for an HTTP form-automation service fronting the complaint site.
pub struct HttpPortalClient {
    client: Client,
    config: PortalConfig,
}

#[derive(Debug, Deserialize)]
struct OpenedForm {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Confirmation {
    service_request_number: String,
}

impl HttpPortalClient {
    pub fn new(config: PortalConfig) -> Result<Self, PortalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortalError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, PortalError> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_request_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>());
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            Err(PortalError::Rejected(detail))
        } else {
            Err(PortalError::ApiError(detail))
        }
    }
}

fn map_request_error(e: reqwest::Error) -> PortalError {
    if e.is_timeout() {
        PortalError::Timeout
    } else if e.is_connect() {
        PortalError::ConnectionFailed(e.to_string())
    } else {
        PortalError::ApiError(e.to_string())
    }
}

#[async_trait]
impl ComplaintPortal for HttpPortalClient {
    fn name(&self) -> &str {
        "http-portal"
    }

    async fn prepare(&self, draft: &ComplaintDraft) -> Result<PreparedComplaint, PortalError> {
        let form: OpenedForm = self
            .send(self.client.post(self.url("complaints")).json(draft))
            .await?
            .json()
            .await
            .map_err(|e| PortalError::ApiError(format!("Failed to parse form: {}", e)))?;
        let prepared = PreparedComplaint {
            handle: form.id,
            event_id: draft.event_id.clone(),
        };
        debug!(event_id = %draft.event_id, handle = %prepared.handle, "Complaint form opened");

        if let Some(path) = &draft.attachment {
            let clip = tokio::fs::read(path).await?;
            let url = self.url(&format!(
                "complaints/{}/attachment",
                urlencoding::encode(&prepared.handle)
            ));
            let request = self
                .client
                .put(url)
                .header(reqwest::header::CONTENT_TYPE, "video/mp4")
                .body(clip);
            if let Err(e) = self.send(request).await {
                // The form is useless without its attachment.
                let _ = self.discard(&prepared).await;
                return Err(PortalError::AttachmentFailed(e.to_string()));
            }
        }

        Ok(prepared)
    }

    async fn confirm(&self, prepared: &PreparedComplaint) -> Result<String, PortalError> {
        let url = self.url(&format!(
            "complaints/{}/submit",
            urlencoding::encode(&prepared.handle)
        ));
        let confirmation: Confirmation = self
            .send(self.client.post(url))
            .await?
            .json()
            .await
            .map_err(|e| PortalError::ApiError(format!("Failed to parse confirmation: {}", e)))?;
        Ok(confirmation.service_request_number)
    }

    async fn discard(&self, prepared: &PreparedComplaint) -> Result<(), PortalError> {
        let url = self.url(&format!(
            "complaints/{}",
            urlencoding::encode(&prepared.handle)
        ));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}
