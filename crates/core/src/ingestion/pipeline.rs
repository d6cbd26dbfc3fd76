use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::artifacts::{file_size, ArtifactLayout};
use crate::event::Event;
use crate::metrics;
use crate::single_flight::SingleFlight;
use crate::source::{fetch_events, EventSource};
use crate::store::EventStore;

use super::{read_event_entry, to_megabytes, ClipDownloader, IngestionConfig, IngestionError};

/// Result of one staging pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingReport {
    /// Another staging pass was running; nothing was done.
    pub skipped: bool,
    pub fetched: usize,
    pub already_staged: Vec<String>,
    pub downloaded: Vec<String>,
    /// Ids a dry run would have downloaded.
    pub would_download: Vec<String>,
}

/// Moves events from the source into the local artifact tree.
pub struct IngestionPipeline {
    source: Arc<dyn EventSource>,
    store: Arc<EventStore>,
    layout: ArtifactLayout,
    downloader: ClipDownloader,
    page_size: u32,
    fetch_flight: SingleFlight,
    staging_flight: SingleFlight,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<EventStore>,
        layout: ArtifactLayout,
        config: &IngestionConfig,
        page_size: u32,
    ) -> Self {
        Self {
            downloader: ClipDownloader::new(Arc::clone(&source), config),
            source,
            store,
            layout,
            page_size,
            fetch_flight: SingleFlight::new(),
            staging_flight: SingleFlight::new(),
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_flight.is_running()
    }

    pub fn is_staging(&self) -> bool {
        self.staging_flight.is_running()
    }

    /// Fetch events in `(after, before]`, index them, and download the final
    /// clip for every event without a submission artifact.
    ///
    /// Each final clip must match its staged copy byte for byte in size.
    /// Returns the fetched events, or nothing if a fetch is already running.
    pub async fn fetch_and_download(
        &self,
        after: DateTime<Utc>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, IngestionError> {
        let Some(_flight) = self.fetch_flight.try_begin() else {
            warn!("Event fetch already running, skipping");
            return Ok(Vec::new());
        };

        let events = fetch_events(self.source.as_ref(), after, before, self.page_size).await?;
        info!(count = events.len(), "Events fetched");

        let mut created = 0;
        let outcome = self.index_and_download(&events, &mut created).await;

        // Entries indexed before a failure are persisted too.
        let saved = if created > 0 {
            self.store.save().await
        } else {
            Ok(())
        };
        outcome?;
        saved?;
        info!(count = events.len(), created, "Event download complete");
        Ok(events)
    }

    async fn index_and_download(
        &self,
        events: &[Event],
        created: &mut usize,
    ) -> Result<(), IngestionError> {
        for event in events {
            if !self.store.exists(&event.id) {
                let state = read_event_entry(&self.layout, event.clone()).await?;
                self.store.create(&event.id, state)?;
                *created += 1;
            }

            // The artifact on disk, not the store, decides whether an event
            // was submitted.
            if self.layout.has_service_request(&event.id).await? {
                info!(event_id = %event.id, "Skipping event with service request");
                continue;
            }

            self.download_final_clip(event).await?;
        }
        Ok(())
    }

    async fn download_final_clip(&self, event: &Event) -> Result<(), IngestionError> {
        let paths = self.layout.paths(&event.id)?;

        let staged = file_size(&paths.staged_clip)
            .await?
            .ok_or_else(|| IngestionError::StagingMissing(event.id.clone()))?;

        if file_size(&paths.clip).await? == Some(staged) {
            info!(event_id = %event.id, "Clip already downloaded");
        } else {
            info!(event_id = %event.id, timestamp = %event.timestamp(), "Downloading clip");
            self.downloader.download(&event.id, &paths.clip).await?;
            metrics::CLIPS_DOWNLOADED.with_label_values(&["final"]).inc();
        }

        let fetched = file_size(&paths.clip).await?.unwrap_or(0);
        if fetched != staged {
            return Err(IngestionError::SizeMismatch {
                event_id: event.id.clone(),
                fetched,
                staged,
            });
        }
        if !self.downloader.policy().is_valid(fetched) {
            return Err(IngestionError::ClipSizeOutOfRange {
                event_id: event.id.clone(),
                megabytes: to_megabytes(fetched),
            });
        }
        info!(event_id = %event.id, megabytes = to_megabytes(fetched), "Clip verified");

        let document = self.source.event_document(&event.id).await?;
        self.layout.write_metadata(&event.id, &document).await?;
        Ok(())
    }

    /// Download a staged copy of every event in `(after, before]` that lacks
    /// a valid one. A dry run only reports what it would download.
    pub async fn stage_clips(
        &self,
        after: DateTime<Utc>,
        before: Option<DateTime<Utc>>,
        dry_run: bool,
    ) -> Result<StagingReport, IngestionError> {
        let Some(_flight) = self.staging_flight.try_begin() else {
            warn!("Staging fetch already running, skipping");
            return Ok(StagingReport {
                skipped: true,
                ..StagingReport::default()
            });
        };

        let events = fetch_events(self.source.as_ref(), after, before, self.page_size).await?;
        let mut report = StagingReport {
            fetched: events.len(),
            ..StagingReport::default()
        };
        info!(count = events.len(), dry_run, "Staging events");

        for event in &events {
            let paths = self.layout.paths(&event.id)?;
            let staged = file_size(&paths.staged_clip).await?;
            if staged.is_some_and(|bytes| self.downloader.policy().is_valid(bytes)) {
                info!(event_id = %event.id, "Staging clip already exists");
                report.already_staged.push(event.id.clone());
                continue;
            }

            if dry_run {
                info!(event_id = %event.id, "Would download staging clip");
                report.would_download.push(event.id.clone());
                continue;
            }

            info!(event_id = %event.id, timestamp = %event.timestamp(), "Downloading staging clip");
            self.downloader
                .download(&event.id, &paths.staged_clip)
                .await?;
            metrics::CLIPS_DOWNLOADED.with_label_values(&["staging"]).inc();
            report.downloaded.push(event.id.clone());
        }

        info!(
            downloaded = report.downloaded.len(),
            already_staged = report.already_staged.len(),
            "Staging complete"
        );
        Ok(report)
    }

    /// Remove every staging directory.
    pub async fn clean_staged_clips(&self) -> Result<Vec<String>, IngestionError> {
        Ok(self.layout.clean_staging().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ServiceRequest;
    use crate::testing::{fixtures, MockEventSource};
    use tempfile::TempDir;

    const MB: u64 = 1024 * 1024;

    struct Harness {
        _temp: TempDir,
        source: Arc<MockEventSource>,
        store: Arc<EventStore>,
        pipeline: Arc<IngestionPipeline>,
    }

    fn harness() -> Harness {
        let temp = TempDir::new().unwrap();
        let layout = fixtures::layout(&temp);
        let source = Arc::new(MockEventSource::new());
        let store = Arc::new(EventStore::new(temp.path().join("db.json")));
        let pipeline = Arc::new(IngestionPipeline::new(
            source.clone(),
            store.clone(),
            layout,
            &fixtures::fast_ingestion_config(),
            250,
        ));
        Harness {
            _temp: temp,
            source,
            store,
            pipeline,
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_requires_staged_clip() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;

        let err = h.pipeline.fetch_and_download(epoch(), None).await.unwrap_err();
        assert!(matches!(err, IngestionError::StagingMissing(id) if id == "a"));
        // Indexed before the staging check failed, and persisted.
        assert!(h.store.exists("a"));
        let reloaded = EventStore::load(h.store.path(), h.pipeline.layout()).await.unwrap();
        assert!(reloaded.exists("a"));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_earlier_entries() {
        let h = harness();
        h.source
            .set_events(vec![
                fixtures::event("a", 100.0, 110.0),
                fixtures::event("b", 200.0, 210.0),
            ])
            .await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", 2 * MB).await;

        let err = h.pipeline.fetch_and_download(epoch(), None).await.unwrap_err();
        assert!(matches!(err, IngestionError::StagingMissing(id) if id == "b"));

        let raw = std::fs::read_to_string(h.store.path()).unwrap();
        assert!(raw.contains("\"a\""));
        assert!(raw.contains("\"b\""));
    }

    #[tokio::test]
    async fn test_fetch_downloads_and_writes_metadata() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
        h.source.set_clip_size(2 * MB).await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", 2 * MB).await;

        let events = h.pipeline.fetch_and_download(epoch(), None).await.unwrap();

        assert_eq!(events.len(), 1);
        let paths = h.pipeline.layout().paths("a").unwrap();
        assert_eq!(std::fs::metadata(&paths.clip).unwrap().len(), 2 * MB);
        let saved = h.pipeline.layout().read_metadata("a").await.unwrap();
        assert_eq!(saved.id, "a");
        assert!(h.store.path().exists());
    }

    #[tokio::test]
    async fn test_fetch_skips_matching_download() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", 2 * MB).await;
        fixtures::write_clip(h.pipeline.layout(), "a", 2 * MB).await;

        h.pipeline.fetch_and_download(epoch(), None).await.unwrap();
        assert_eq!(h.source.clip_download_count("a").await, 0);
    }

    #[tokio::test]
    async fn test_fetch_size_mismatch_is_fatal() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
        h.source.set_clip_size(3 * MB).await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", 2 * MB).await;

        let err = h.pipeline.fetch_and_download(epoch(), None).await.unwrap_err();
        assert!(matches!(
            err,
            IngestionError::SizeMismatch {
                fetched,
                staged,
                ..
            } if fetched == 3 * MB && staged == 2 * MB
        ));
    }

    #[tokio::test]
    async fn test_fetch_skips_event_with_service_request_on_disk() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
        h.pipeline
            .layout()
            .write_service_request("a", &ServiceRequest::pending("01/01/2024", "01/01/2024 9:00 AM"))
            .await
            .unwrap();

        // No staged clip: would fail if the event were not skipped.
        h.pipeline.fetch_and_download(epoch(), None).await.unwrap();

        let state = h.store.get("a").unwrap();
        assert!(state.service_request.unwrap().is_pending());
        assert_eq!(h.source.clip_download_count("a").await, 0);
    }

    #[tokio::test]
    async fn test_fetch_is_single_flight() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
        h.source.set_clip_size(2 * MB).await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", 2 * MB).await;
        let gate = h.source.hold_downloads().await;

        let first = {
            let pipeline = h.pipeline.clone();
            tokio::spawn(async move { pipeline.fetch_and_download(epoch(), None).await })
        };
        while !h.pipeline.is_fetching() {
            tokio::task::yield_now().await;
        }

        let second = h.pipeline.fetch_and_download(epoch(), None).await.unwrap();
        assert!(second.is_empty());

        gate.release();
        assert_eq!(first.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stage_clips_dry_run_downloads_nothing() {
        let h = harness();
        h.source
            .set_events(vec![
                fixtures::event("a", 100.0, 110.0),
                fixtures::event("b", 200.0, 210.0),
            ])
            .await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", 2 * MB).await;

        let report = h.pipeline.stage_clips(epoch(), None, true).await.unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.already_staged, vec!["a"]);
        assert_eq!(report.would_download, vec!["b"]);
        assert!(report.downloaded.is_empty());
        assert_eq!(h.source.clip_download_count("b").await, 0);
    }

    #[tokio::test]
    async fn test_stage_clips_replaces_invalid_staged_copy() {
        let h = harness();
        h.source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
        h.source.set_clip_size(2 * MB).await;
        fixtures::write_staged_clip(h.pipeline.layout(), "a", MB / 2).await;

        let report = h.pipeline.stage_clips(epoch(), None, false).await.unwrap();

        assert_eq!(report.downloaded, vec!["a"]);
        let staged = h.pipeline.layout().paths("a").unwrap().staged_clip;
        assert_eq!(std::fs::metadata(staged).unwrap().len(), 2 * MB);
    }

    #[tokio::test]
    async fn test_clean_staged_clips() {
        let h = harness();
        fixtures::write_staged_clip(h.pipeline.layout(), "a", MB).await;
        fixtures::write_staged_clip(h.pipeline.layout(), "b", MB).await;

        let removed = h.pipeline.clean_staged_clips().await.unwrap();
        assert_eq!(removed, vec!["a", "b"]);
        assert!(h.pipeline.layout().staged_event_ids().await.unwrap().is_empty());
    }
}
