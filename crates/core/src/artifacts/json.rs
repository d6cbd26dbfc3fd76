use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::ArtifactError;

/// Read and parse a JSON artifact.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ArtifactError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| ArtifactError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a pretty-printed JSON artifact, creating the parent directory.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArtifactError::io(parent, e))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| ArtifactError::io(path, e))
}

/// Size of a file in bytes, or `None` if it does not exist.
pub async fn file_size(path: &Path) -> Result<Option<u64>, ArtifactError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ArtifactError::io(path, e)),
    }
}
