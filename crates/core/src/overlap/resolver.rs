use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::metrics;
use crate::source::{fetch_events, EventSource};

use super::{plan_deletions, OverlapConfig, OverlapError, PlannedDeletion};

/// Removes duplicate and overlong events from the source system.
pub struct OverlapResolver {
    source: Arc<dyn EventSource>,
    config: OverlapConfig,
    page_size: u32,
}

impl OverlapResolver {
    pub fn new(source: Arc<dyn EventSource>, config: OverlapConfig, page_size: u32) -> Self {
        Self {
            source,
            config,
            page_size,
        }
    }

    pub fn config(&self) -> &OverlapConfig {
        &self.config
    }

    /// Deletions that [`resolve_overlaps`](Self::resolve_overlaps) would make.
    pub async fn plan(
        &self,
        after: DateTime<Utc>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<PlannedDeletion>, OverlapError> {
        let events = fetch_events(self.source.as_ref(), after, before, self.page_size).await?;
        info!(count = events.len(), "Checking overlapping events");
        Ok(plan_deletions(&events, &self.config))
    }

    /// Delete every planned event from the source, one at a time.
    ///
    /// Deletions are irreversible. The first failed deletion aborts the pass.
    pub async fn resolve_overlaps(
        &self,
        after: DateTime<Utc>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<PlannedDeletion>, OverlapError> {
        let plan = self.plan(after, before).await?;
        let pacing = Duration::from_millis(self.config.delete_pacing_ms);

        for deletion in &plan {
            info!(
                event_id = %deletion.event_id,
                reason = deletion.reason.label(),
                "Deleting event"
            );
            self.source.delete_event(&deletion.event_id).await?;
            metrics::OVERLAP_DELETIONS
                .with_label_values(&[deletion.reason.label()])
                .inc();
            tokio::time::sleep(pacing).await;
        }

        info!(deleted = plan.len(), "Done checking overlapping events");
        Ok(plan)
    }
}
