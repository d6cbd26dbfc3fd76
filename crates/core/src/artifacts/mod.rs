//! On-disk per-event artifacts.
//!
//! Artifacts, not the event store, are authoritative for whether an event
//! exists and whether it has already been submitted.

mod json;
mod layout;

pub use json::{file_size, read_json, write_json};
pub use layout::{validate_event_id, ArtifactLayout, EventPaths};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("events directory and staging directory must differ: {0}")]
    SharedDirectory(PathBuf),

    #[error("invalid event id: {0:?}")]
    InvalidEventId(String),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
