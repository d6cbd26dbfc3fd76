//! Source NVR event system.
//!
//! The [`EventSource`] trait is the only way the core talks to the NVR:
//! window queries, per-event metadata and clips, and deletion.

mod frigate;

pub use frigate::FrigateClient;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::event::{epoch_seconds, Event};

/// Maximum events returned per window query.
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// Raw query parameters, in epoch seconds, as sent to the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub after: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<i64>,
    pub limit: u32,
}

impl EventQuery {
    /// Query for events starting in `(after, before]`.
    ///
    /// The source treats both bounds as exclusive, so each is shifted by
    /// one second.
    pub fn window(after: DateTime<Utc>, before: Option<DateTime<Utc>>, limit: u32) -> Self {
        Self {
            after: epoch_seconds(after) + 1,
            before: before.map(|b| epoch_seconds(b) + 1),
            limit,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source connection failed: {0}")]
    ConnectionFailed(String),

    #[error("source request timed out")]
    Timeout,

    #[error("source API error: {0}")]
    ApiError(String),

    #[error("event not found in source: {0}")]
    NotFound(String),

    #[error("failed to write clip: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Events matching the raw query, in source order.
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, SourceError>;

    /// Full metadata document for one event.
    async fn event_document(&self, event_id: &str) -> Result<serde_json::Value, SourceError>;

    /// Download an event's clip to `dest`, returning the bytes written.
    async fn download_clip(&self, event_id: &str, dest: &Path) -> Result<u64, SourceError>;

    /// Delete an event from the source. Irreversible.
    async fn delete_event(&self, event_id: &str) -> Result<(), SourceError>;
}

/// Fetch events starting in `(after, before]`, sorted ascending by start time.
pub async fn fetch_events(
    source: &dyn EventSource,
    after: DateTime<Utc>,
    before: Option<DateTime<Utc>>,
    page_size: u32,
) -> Result<Vec<Event>, SourceError> {
    let query = EventQuery::window(after, before, page_size);
    debug!(source = source.name(), ?query, "Fetching events");

    let mut events = source.list_events(&query).await?;
    events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    Ok(events)
}
