use std::path::{Path, PathBuf};

use crate::event::{Event, ServiceRequest, ServiceRequestStatus};

use super::json::{read_json, write_json};
use super::ArtifactError;

const METADATA_FILE: &str = "event.json";
const SERVICE_REQUEST_FILE: &str = "SR.json";
const RESOLUTION_FILE: &str = "resolution.json";
const REVIEW_FILE: &str = "review.json";
const CLIP_FILE: &str = "clip.mp4";

/// Directories left behind by partial cloud-drive syncs.
const SYNC_TEMP_MARKER: &str = ".tmp.driveupload";

/// Paths of every artifact belonging to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPaths {
    pub event_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub metadata: PathBuf,
    pub service_request: PathBuf,
    pub resolution: PathBuf,
    pub clip: PathBuf,
    pub staged_clip: PathBuf,
    pub review: PathBuf,
    /// Key used when the clip is uploaded to object storage.
    pub object_key: String,
}

/// Root directories of the artifact tree.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    events_dir: PathBuf,
    staging_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(
        events_dir: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
    ) -> Result<Self, ArtifactError> {
        let events_dir = events_dir.into();
        let staging_dir = staging_dir.into();
        if events_dir == staging_dir {
            return Err(ArtifactError::SharedDirectory(events_dir));
        }
        Ok(Self {
            events_dir,
            staging_dir,
        })
    }

    pub fn events_dir(&self) -> &Path {
        &self.events_dir
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Artifact paths for `event_id`.
    ///
    /// Fails for ids that would resolve outside the artifact roots.
    pub fn paths(&self, event_id: &str) -> Result<EventPaths, ArtifactError> {
        validate_event_id(event_id)?;
        let event_dir = self.events_dir.join(event_id);
        let staging_dir = self.staging_dir.join(event_id);
        Ok(EventPaths {
            metadata: event_dir.join(METADATA_FILE),
            service_request: event_dir.join(SERVICE_REQUEST_FILE),
            resolution: event_dir.join(RESOLUTION_FILE),
            clip: event_dir.join(CLIP_FILE),
            staged_clip: staging_dir.join(CLIP_FILE),
            review: staging_dir.join(REVIEW_FILE),
            object_key: format!("{}/{}", event_id, CLIP_FILE),
            event_dir,
            staging_dir,
        })
    }

    /// Ids of every event with a directory under the events root.
    pub async fn saved_event_ids(&self) -> Result<Vec<String>, ArtifactError> {
        list_directories(&self.events_dir).await
    }

    /// Ids of every event with a directory under the staging root.
    pub async fn staged_event_ids(&self) -> Result<Vec<String>, ArtifactError> {
        list_directories(&self.staging_dir).await
    }

    pub async fn has_service_request(&self, event_id: &str) -> Result<bool, ArtifactError> {
        Ok(exists(&self.paths(event_id)?.service_request).await)
    }

    pub async fn has_resolution(&self, event_id: &str) -> Result<bool, ArtifactError> {
        Ok(exists(&self.paths(event_id)?.resolution).await)
    }

    pub async fn read_metadata(&self, event_id: &str) -> Result<Event, ArtifactError> {
        read_json(&self.paths(event_id)?.metadata).await
    }

    pub async fn write_metadata(
        &self,
        event_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), ArtifactError> {
        write_json(&self.paths(event_id)?.metadata, document).await
    }

    pub async fn read_service_request(
        &self,
        event_id: &str,
    ) -> Result<Option<ServiceRequest>, ArtifactError> {
        read_optional(&self.paths(event_id)?.service_request).await
    }

    pub async fn write_service_request(
        &self,
        event_id: &str,
        request: &ServiceRequest,
    ) -> Result<(), ArtifactError> {
        write_json(&self.paths(event_id)?.service_request, request).await
    }

    /// Delete the service request artifact if present.
    pub async fn remove_service_request(&self, event_id: &str) -> Result<(), ArtifactError> {
        let path = self.paths(event_id)?.service_request;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArtifactError::io(&path, e)),
        }
    }

    pub async fn read_resolution(
        &self,
        event_id: &str,
    ) -> Result<Option<ServiceRequestStatus>, ArtifactError> {
        read_optional(&self.paths(event_id)?.resolution).await
    }

    pub async fn write_resolution(
        &self,
        event_id: &str,
        status: &ServiceRequestStatus,
    ) -> Result<(), ArtifactError> {
        write_json(&self.paths(event_id)?.resolution, status).await
    }

    /// Remove every staging directory. Returns the removed ids.
    pub async fn clean_staging(&self) -> Result<Vec<String>, ArtifactError> {
        let ids = self.staged_event_ids().await?;
        for id in &ids {
            let dir = self.staging_dir.join(id);
            tracing::info!(path = %dir.display(), "Deleting staging directory");
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| ArtifactError::io(&dir, e))?;
        }
        Ok(ids)
    }
}

/// Reject ids that are empty, are `.` or `..`, or contain a path separator.
pub fn validate_event_id(event_id: &str) -> Result<(), ArtifactError> {
    let invalid = event_id.is_empty()
        || event_id == "."
        || event_id == ".."
        || event_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ArtifactError::InvalidEventId(event_id.to_string()));
    }
    Ok(())
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_optional<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, ArtifactError> {
    if !exists(path).await {
        return Ok(None);
    }
    read_json(path).await.map(Some)
}

async fn list_directories(root: &Path) -> Result<Vec<String>, ArtifactError> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ArtifactError::io(root, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ArtifactError::io(root, e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(SYNC_TEMP_MARKER) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
