use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::ingestion::IngestionError;
use crate::review::ReviewError;
use crate::source::SourceError;
use crate::store::StoreError;

use super::{PortalError, StorageError};

/// What the submission pipeline is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Submitting { batch_id: u64 },
}

/// Shared progress record, published on every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionStatus {
    pub phase: SubmissionPhase,
    pub batch_size: usize,
    pub processed: usize,
    pub events_before: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub last_error: Option<String>,
    pub last_report: Option<BatchReport>,
}

impl SubmissionStatus {
    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, SubmissionPhase::Submitting { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Submitted { request_number: String },
    AlreadySubmitted,
    SkippedOverlap,
    DryRun,
    Canceled,
}

impl EventOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::AlreadySubmitted => "already_submitted",
            Self::SkippedOverlap => "skipped_overlap",
            Self::DryRun => "dry_run",
            Self::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventResult {
    pub event_id: String,
    #[serde(flatten)]
    pub outcome: EventOutcome,
}

/// Summary of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// `None` if another batch was already running and nothing was done.
    pub batch_id: Option<u64>,
    pub fetched: usize,
    pub results: Vec<EventResult>,
    pub canceled: bool,
}

impl BatchReport {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                EventOutcome::Submitted { request_number } => Some(request_number.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("no submission watermark found, seed one first")]
    MissingWatermark,

    #[error("unknown time zone: {0}")]
    InvalidTimezone(String),

    #[error("event {event_id} has {have} of {need} required reviews")]
    InsufficientReviews { event_id: String, have: u32, need: u32 },

    #[error("event {event_id} has no profile matching its zones: {}", zones.join(", "))]
    NoMatchingProfile { event_id: String, zones: Vec<String> },

    #[error("profile for event {event_id} is missing an address or description")]
    IncompleteProfile { event_id: String },

    #[error("clip missing for event {0}")]
    ClipMissing(String),

    #[error("clip for event {event_id} outside accepted size window ({megabytes:.2}MB)")]
    ClipSizeOutOfRange { event_id: String, megabytes: f64 },

    #[error("submission of event {event_id} may have gone through without confirmation; resolve the pending request manually: {source}")]
    ConfirmationLost {
        event_id: String,
        #[source]
        source: PortalError,
    },

    #[error("event {event_id} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        event_id: String,
        attempts: u32,
        #[source]
        last: Box<SubmissionError>,
    },

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Portal(#[from] PortalError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubmissionError {
    /// Whether waiting and trying the same event again might succeed.
    ///
    /// Preconditions and integrity failures are final for the event.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Portal(PortalError::Rejected(_)) => false,
            Self::Portal(_) | Self::Storage(_) | Self::Source(_) | Self::Artifact(_) => true,
            Self::Review(ReviewError::Artifact(_)) => true,
            Self::Ingestion(e) => matches!(
                e,
                IngestionError::Source(_)
                    | IngestionError::Artifact(_)
                    | IngestionError::DownloadFailed { .. }
            ),
            Self::MissingWatermark
            | Self::InvalidTimezone(_)
            | Self::InsufficientReviews { .. }
            | Self::NoMatchingProfile { .. }
            | Self::IncompleteProfile { .. }
            | Self::ClipMissing(_)
            | Self::ClipSizeOutOfRange { .. }
            | Self::ConfirmationLost { .. }
            | Self::RetriesExhausted { .. }
            | Self::Store(_) => false,
        }
    }
}
