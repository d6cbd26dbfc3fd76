//! Ingestion pipeline: fetch events from the source, download and validate
//! clips, and index on-disk artifacts into the event store.

mod clip;
mod config;
mod pipeline;
mod reconcile;

pub use clip::{to_megabytes, ClipDownloader, ClipSize, ClipSizePolicy};
pub use config::IngestionConfig;
pub use pipeline::{IngestionPipeline, StagingReport};
pub use reconcile::{read_event_entry, reconcile};

use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::source::SourceError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("staging clip not found for event {0}")]
    StagingMissing(String),

    #[error("clip and staging size mismatch for event {event_id}: {fetched} != {staged}")]
    SizeMismatch {
        event_id: String,
        fetched: u64,
        staged: u64,
    },

    #[error("clip for event {event_id} too large ({megabytes:.2}MB), remove it from the source")]
    ClipTooLarge { event_id: String, megabytes: f64 },

    #[error("clip for event {event_id} outside accepted size window ({megabytes:.2}MB)")]
    ClipSizeOutOfRange { event_id: String, megabytes: f64 },

    #[error("clip download failed for event {event_id} after {attempts} attempts")]
    DownloadFailed { event_id: String, attempts: u32 },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
