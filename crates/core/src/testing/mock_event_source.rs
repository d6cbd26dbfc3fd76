//! Mock event source for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};

use crate::event::Event;
use crate::source::{EventQuery, EventSource, SourceError};

/// Scripted result of one clip download.
#[derive(Debug)]
pub enum ClipResponse {
    /// Write a file of this many bytes.
    Bytes(u64),
    Fail(SourceError),
}

/// Holds clip downloads until released.
#[derive(Debug, Clone)]
pub struct DownloadGate {
    semaphore: Arc<Semaphore>,
}

impl DownloadGate {
    pub fn release(&self) {
        self.semaphore.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

/// Mock implementation of the EventSource trait.
///
/// Serves a configurable event list, writes sparse clip files of scripted
/// sizes, and records queries, downloads and deletions for assertions.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockEventSource::new();
/// source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
/// source.queue_clip_responses("a", vec![ClipResponse::Bytes(2 * 1024 * 1024)]).await;
/// ```
#[derive(Debug)]
pub struct MockEventSource {
    events: Arc<RwLock<Vec<Event>>>,
    documents: Arc<RwLock<HashMap<String, serde_json::Value>>>,
    clip_responses: Arc<RwLock<HashMap<String, VecDeque<ClipResponse>>>>,
    /// Size written when no scripted response is queued.
    default_clip_size: Arc<RwLock<u64>>,
    clip_downloads: Arc<RwLock<HashMap<String, u32>>>,
    queries: Arc<RwLock<Vec<EventQuery>>>,
    deleted: Arc<RwLock<Vec<String>>>,
    delete_errors: Arc<RwLock<HashMap<String, SourceError>>>,
    gate: Arc<RwLock<Option<DownloadGate>>>,
}

impl Default for MockEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEventSource {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            documents: Arc::new(RwLock::new(HashMap::new())),
            clip_responses: Arc::new(RwLock::new(HashMap::new())),
            default_clip_size: Arc::new(RwLock::new(2 * 1024 * 1024)),
            clip_downloads: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            delete_errors: Arc::new(RwLock::new(HashMap::new())),
            gate: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_events(&self, events: Vec<Event>) {
        *self.events.write().await = events;
    }

    /// Override the metadata document served for an event.
    pub async fn set_document(&self, event_id: &str, document: serde_json::Value) {
        self.documents
            .write()
            .await
            .insert(event_id.to_string(), document);
    }

    pub async fn set_clip_size(&self, bytes: u64) {
        *self.default_clip_size.write().await = bytes;
    }

    pub async fn queue_clip_responses(&self, event_id: &str, responses: Vec<ClipResponse>) {
        self.clip_responses
            .write()
            .await
            .entry(event_id.to_string())
            .or_default()
            .extend(responses);
    }

    /// Make the next deletion of `event_id` fail.
    pub async fn fail_delete(&self, event_id: &str, error: SourceError) {
        self.delete_errors
            .write()
            .await
            .insert(event_id.to_string(), error);
    }

    /// Block clip downloads until the returned gate is released.
    pub async fn hold_downloads(&self) -> DownloadGate {
        let gate = DownloadGate {
            semaphore: Arc::new(Semaphore::new(0)),
        };
        *self.gate.write().await = Some(gate.clone());
        gate
    }

    pub async fn clip_download_count(&self, event_id: &str) -> u32 {
        self.clip_downloads
            .read()
            .await
            .get(event_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn recorded_queries(&self) -> Vec<EventQuery> {
        self.queries.read().await.clone()
    }

    pub async fn deleted_events(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, SourceError> {
        self.queries.write().await.push(query.clone());

        // The window is (after - 1, before - 1] in query terms.
        let after = (query.after - 1) as f64;
        let before = query.before.map(|b| (b - 1) as f64);
        let deleted = self.deleted.read().await.clone();
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.start_time > after && before.map_or(true, |b| e.start_time <= b))
            .filter(|e| !deleted.contains(&e.id))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn event_document(&self, event_id: &str) -> Result<serde_json::Value, SourceError> {
        if let Some(document) = self.documents.read().await.get(event_id) {
            return Ok(document.clone());
        }
        let events = self.events.read().await;
        let event = events
            .iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| SourceError::NotFound(event_id.to_string()))?;
        serde_json::to_value(event).map_err(|e| SourceError::ApiError(e.to_string()))
    }

    async fn download_clip(&self, event_id: &str, dest: &Path) -> Result<u64, SourceError> {
        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            let _permit = gate
                .semaphore
                .acquire()
                .await
                .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
        }

        *self
            .clip_downloads
            .write()
            .await
            .entry(event_id.to_string())
            .or_insert(0) += 1;

        let scripted = self
            .clip_responses
            .write()
            .await
            .get_mut(event_id)
            .and_then(|queue| queue.pop_front());
        let bytes = match scripted {
            Some(ClipResponse::Fail(e)) => return Err(e),
            Some(ClipResponse::Bytes(bytes)) => bytes,
            None => *self.default_clip_size.read().await,
        };

        let file = tokio::fs::File::create(dest).await?;
        file.set_len(bytes).await?;
        Ok(bytes)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), SourceError> {
        if let Some(error) = self.delete_errors.write().await.remove(event_id) {
            return Err(error);
        }
        self.deleted.write().await.push(event_id.to_string());
        Ok(())
    }
}
