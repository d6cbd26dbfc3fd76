//! Review gate: per-event review counters and the submission quorum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::artifacts::{file_size, read_json, write_json, ArtifactError, ArtifactLayout};
use crate::event::Event;

/// Smallest quorum the gate will accept, whatever is configured.
pub const MINIMUM_QUORUM: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Reviews required before an event may be submitted (at least 2).
    #[serde(default = "default_minimum_reviews")]
    pub minimum_reviews: u32,
}

fn default_minimum_reviews() -> u32 {
    MINIMUM_QUORUM
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            minimum_reviews: default_minimum_reviews(),
        }
    }
}

/// Review counter persisted next to the staged clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatus {
    pub total_reviews: u32,
}

/// Review progress of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub zones: Vec<String>,
    /// Whether a staged clip exists to watch.
    pub staged: bool,
    pub total_reviews: u32,
    pub admissible: bool,
}

/// Events awaiting review, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewQueue {
    pub minimum_reviews: u32,
    pub events: Vec<ReviewEntry>,
    /// Timestamp of the last event in the leading run of admissible events,
    /// the furthest a submission can go without hitting an unreviewed one.
    pub suggested_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Quorum check and increment rule over [`ReviewStatus`].
#[derive(Debug, Clone)]
pub struct ReviewGate {
    minimum: u32,
    layout: ArtifactLayout,
}

impl ReviewGate {
    pub fn new(config: &ReviewConfig, layout: ArtifactLayout) -> Self {
        Self {
            minimum: config.minimum_reviews.max(MINIMUM_QUORUM),
            layout,
        }
    }

    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    /// Whether moving from `current` to `new_total` is a valid increment.
    pub fn accepts(&self, current: ReviewStatus, new_total: u32) -> bool {
        new_total <= self.minimum && current.total_reviews.checked_add(1) == Some(new_total)
    }

    pub fn is_admissible(&self, status: Option<ReviewStatus>) -> bool {
        status.is_some_and(|s| s.total_reviews >= self.minimum)
    }

    /// Stored review status, or `None` if the event was never reviewed.
    pub async fn load(&self, event_id: &str) -> Result<Option<ReviewStatus>, ReviewError> {
        let path = self.layout.paths(event_id)?.review;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Ok(Some(read_json(&path).await?))
    }

    /// Record a review if `new_total` is exactly one more than the stored
    /// count and within the quorum. Anything else is ignored.
    ///
    /// Returns whether the increment was applied.
    pub async fn increment(&self, event_id: &str, new_total: u32) -> Result<bool, ReviewError> {
        let current = self.load(event_id).await?.unwrap_or_default();
        if !self.accepts(current, new_total) {
            debug!(
                event_id,
                current = current.total_reviews,
                new_total,
                "Ignoring review increment"
            );
            return Ok(false);
        }

        let next = ReviewStatus {
            total_reviews: new_total,
        };
        write_json(&self.layout.paths(event_id)?.review, &next).await?;
        info!(event_id, total_reviews = new_total, "Review recorded");
        Ok(true)
    }

    /// Review progress for `events`, which must be sorted oldest first.
    pub async fn queue(&self, events: &[Event]) -> Result<ReviewQueue, ReviewError> {
        let mut entries = Vec::with_capacity(events.len());
        let mut suggested_before = None;
        let mut leading_run = true;

        for event in events {
            let status = self.load(&event.id).await?;
            let admissible = self.is_admissible(status);
            if leading_run && admissible {
                suggested_before = Some(event.timestamp());
            } else {
                leading_run = false;
            }

            let staged_clip = self.layout.paths(&event.id)?.staged_clip;
            entries.push(ReviewEntry {
                event_id: event.id.clone(),
                timestamp: event.timestamp(),
                zones: event.zones.clone(),
                staged: file_size(&staged_clip).await?.is_some(),
                total_reviews: status.map_or(0, |s| s.total_reviews),
                admissible,
            });
        }

        Ok(ReviewQueue {
            minimum_reviews: self.minimum,
            events: entries,
            suggested_before,
        })
    }

    /// Whether the stored review count for `event_id` meets the quorum.
    pub async fn check(&self, event_id: &str) -> Result<bool, ReviewError> {
        Ok(self.is_admissible(self.load(event_id).await?))
    }
}
