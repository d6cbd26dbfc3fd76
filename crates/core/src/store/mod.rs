//! Persisted event store.
//!
//! A full in-memory map from event id to [`EventState`], flushed to a JSON
//! snapshot. Persistence is a whole-file overwrite; mutations between two
//! saves are only in memory.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

use crate::artifacts::ArtifactLayout;
use crate::event::{EventDatabase, EventState};
use crate::ingestion::reconcile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event {0} already exists in store")]
    AlreadyExists(String),

    #[error("event {0} not found in store")]
    NotFound(String),

    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// In-memory event store with snapshot persistence.
///
/// Callers serialize their own mutating sections; the lock only keeps
/// individual operations whole.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    db: RwLock<EventDatabase>,
}

impl EventStore {
    /// Create an empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_database(path, EventDatabase::default())
    }

    pub fn with_database(path: impl Into<PathBuf>, db: EventDatabase) -> Self {
        Self {
            path: path.into(),
            db: RwLock::new(db),
        }
    }

    /// Load the snapshot if present, index any artifacts missing from it,
    /// then persist the result.
    pub async fn load(path: impl Into<PathBuf>, layout: &ArtifactLayout) -> Result<Self, StoreError> {
        let path = path.into();
        let db = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EventDatabase::default(),
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };

        let store = Self::with_database(path, db);
        reconcile(&store, layout).await;
        store.save().await?;
        Ok(store)
    }

    /// Discard the snapshot and rebuild the store from artifacts alone.
    pub async fn rebuild(path: impl Into<PathBuf>, layout: &ArtifactLayout) -> Result<Self, StoreError> {
        let store = Self::new(path);
        reconcile(&store, layout).await;
        store.save().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, event_id: &str) -> bool {
        self.read().events.contains_key(event_id)
    }

    pub fn get(&self, event_id: &str) -> Option<EventState> {
        self.read().events.get(event_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a new event. Fails if the id is already present.
    pub fn create(&self, event_id: &str, state: EventState) -> Result<(), StoreError> {
        let mut db = self.write();
        if db.events.contains_key(event_id) {
            return Err(StoreError::AlreadyExists(event_id.to_string()));
        }
        db.events.insert(event_id.to_string(), state);
        Ok(())
    }

    /// Replace an event's state with `transform(current)`.
    pub fn update<F>(&self, event_id: &str, transform: F) -> Result<EventState, StoreError>
    where
        F: FnOnce(EventState) -> EventState,
    {
        let mut db = self.write();
        let entry = db
            .events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound(event_id.to_string()))?;
        let next = transform(entry.clone());
        *entry = next.clone();
        Ok(next)
    }

    /// Copy of the whole mapping.
    pub fn snapshot(&self) -> EventDatabase {
        self.read().clone()
    }

    /// All states ordered by event timestamp.
    pub fn states(&self) -> Vec<EventState> {
        let mut states: Vec<EventState> = self.read().events.values().cloned().collect();
        states.sort_by(|a, b| {
            a.event
                .start_time
                .total_cmp(&b.event.start_time)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        states
    }

    /// Write the full snapshot.
    pub async fn save(&self) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(&self.snapshot())?;
        let tmp = self.tmp_path();
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        info!(path = %self.path.display(), events = self.len(), "Event store saved");
        Ok(())
    }

    /// Synchronous save for use from shutdown paths.
    pub fn save_blocking(&self) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(&self.snapshot())?;
        let tmp = self.tmp_path();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        std::fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EventDatabase> {
        self.db.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EventDatabase> {
        self.db.write().unwrap_or_else(PoisonError::into_inner)
    }
}
