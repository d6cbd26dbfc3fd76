use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::artifacts::{file_size, ArtifactLayout};
use crate::event::{Event, ServiceRequest, SubmissionRun};
use crate::ingestion::{to_megabytes, ClipSizePolicy, IngestionPipeline};
use crate::metrics;
use crate::overlap::{plan_deletions, OverlapConfig};
use crate::review::ReviewGate;
use crate::single_flight::SingleFlight;
use crate::source::fetch_events;
use crate::store::EventStore;

use super::backoff::wait_unless_canceled;
use super::{
    BackoffPolicy, BatchControl, BatchReport, ComplaintDraft, ComplaintPortal, EventOutcome,
    EventResult, ObjectStorage, PortalError, PreparedComplaint, ProfileTable, StorageError,
    SubmissionConfig, SubmissionError, SubmissionPhase, SubmissionStatus, Watermark,
};

/// Collaborators of the submission pipeline.
pub struct SubmissionServices {
    pub ingestion: Arc<IngestionPipeline>,
    pub store: Arc<EventStore>,
    pub reviews: ReviewGate,
    pub portal: Arc<dyn ComplaintPortal>,
    pub object_storage: Option<Arc<dyn ObjectStorage>>,
    pub watermark: Watermark,
    pub overlap: OverlapConfig,
    pub clip_policy: ClipSizePolicy,
    pub page_size: u32,
}

/// Batch driver that pushes reviewed events through the complaint portal.
///
/// One batch runs at a time. Events are processed in timestamp order, each
/// with its own retry budget; an event that exhausts it aborts the batch.
pub struct SubmissionPipeline {
    services: SubmissionServices,
    layout: ArtifactLayout,
    profiles: ProfileTable,
    timezone: Tz,
    backoff: BackoffPolicy,
    attachment_retries_before_fallback: u32,
    skip_overlapping: bool,
    control: BatchControl,
    flight: SingleFlight,
    status: watch::Sender<SubmissionStatus>,
}

impl SubmissionPipeline {
    pub fn new(
        config: &SubmissionConfig,
        services: SubmissionServices,
    ) -> Result<Self, SubmissionError> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|_| SubmissionError::InvalidTimezone(config.timezone.clone()))?;
        let (status, _) = watch::channel(SubmissionStatus::default());
        Ok(Self {
            layout: services.ingestion.layout().clone(),
            services,
            profiles: ProfileTable::new(config.profiles.clone()),
            timezone,
            backoff: BackoffPolicy::from_config(config),
            attachment_retries_before_fallback: config.attachment_retries_before_fallback,
            skip_overlapping: config.skip_overlapping,
            control: BatchControl::new(),
            flight: SingleFlight::new(),
            status,
        })
    }

    pub fn watermark(&self) -> &Watermark {
        &self.services.watermark
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionStatus> {
        self.status.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.flight.is_running()
    }

    /// Cancel the running batch, if any. Takes effect at the next check.
    pub fn cancel(&self) -> u64 {
        let id = self.control.cancel();
        info!(batch_id = id, "Submission canceled");
        id
    }

    /// Events after the watermark, oldest first.
    pub async fn pending_events(&self) -> Result<(SubmissionRun, Vec<Event>), SubmissionError> {
        let run = self
            .services
            .watermark
            .read()
            .await?
            .ok_or(SubmissionError::MissingWatermark)?;
        let events = fetch_events(
            self.services.ingestion.source().as_ref(),
            run.last_run_time,
            None,
            self.services.page_size,
        )
        .await?;
        Ok((run, events))
    }

    /// Submit every event in `(watermark, before]`.
    ///
    /// Returns a report with no batch id if a batch was already running.
    pub async fn run_batch(
        &self,
        before: Option<DateTime<Utc>>,
        dry_run: bool,
    ) -> Result<BatchReport, SubmissionError> {
        let Some(_flight) = self.flight.try_begin() else {
            info!("Already submitting");
            return Ok(BatchReport::skipped());
        };

        let batch_id = self.control.allocate();
        let started = Instant::now();
        self.status.send_modify(|status| {
            status.phase = SubmissionPhase::Submitting { batch_id };
            status.batch_size = 0;
            status.processed = 0;
            status.events_before = before;
            status.dry_run = dry_run;
            status.last_error = None;
        });
        info!(batch_id, ?before, dry_run, "Submission batch started");

        let result = self.process_batch(batch_id, before, dry_run).await;

        let label = match &result {
            Ok(report) if report.canceled => "canceled",
            Ok(_) => "completed",
            Err(_) => "failed",
        };
        metrics::BATCH_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        self.status.send_modify(|status| {
            status.phase = SubmissionPhase::Idle;
            match &result {
                Ok(report) => status.last_report = Some(report.clone()),
                Err(e) => status.last_error = Some(e.to_string()),
            }
        });
        info!(batch_id, result = label, "Done submitting");
        result
    }

    async fn process_batch(
        &self,
        batch_id: u64,
        before: Option<DateTime<Utc>>,
        dry_run: bool,
    ) -> Result<BatchReport, SubmissionError> {
        let after = self
            .services
            .watermark
            .read()
            .await?
            .ok_or(SubmissionError::MissingWatermark)?
            .last_run_time;
        info!(last_run_time = %after, "Resuming from watermark");

        let events = self.services.ingestion.fetch_and_download(after, before).await?;
        if self.control.is_canceled(batch_id) {
            info!(batch_id, fetched = events.len(), "Batch canceled during download");
            return Ok(BatchReport {
                batch_id: Some(batch_id),
                fetched: events.len(),
                canceled: true,
                ..BatchReport::default()
            });
        }

        let overlapping: HashSet<String> = if self.skip_overlapping {
            plan_deletions(&events, &self.services.overlap)
                .into_iter()
                .map(|deletion| deletion.event_id)
                .collect()
        } else {
            HashSet::new()
        };

        self.status.send_modify(|status| status.batch_size = events.len());
        let mut report = BatchReport {
            batch_id: Some(batch_id),
            fetched: events.len(),
            ..BatchReport::default()
        };

        for (index, event) in events.iter().enumerate() {
            if self.control.is_canceled(batch_id) {
                report.canceled = true;
                break;
            }
            info!(
                event_id = %event.id,
                "--- Submitting event: {} / {} ---",
                index + 1,
                events.len()
            );

            let outcome = if overlapping.contains(&event.id) {
                warn!(event_id = %event.id, "Skipping overlapping event");
                EventOutcome::SkippedOverlap
            } else {
                match self.submit_with_retry(batch_id, event, dry_run).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        metrics::SUBMISSIONS.with_label_values(&["failed"]).inc();
                        error!(event_id = %event.id, error = %e, "Error processing event");
                        return Err(e);
                    }
                }
            };
            metrics::SUBMISSIONS
                .with_label_values(&[outcome.label()])
                .inc();

            let canceled = outcome == EventOutcome::Canceled;
            report.results.push(EventResult {
                event_id: event.id.clone(),
                outcome,
            });
            if canceled {
                report.canceled = true;
                break;
            }
            self.status.send_modify(|status| status.processed = index + 1);
        }

        Ok(report)
    }

    async fn submit_with_retry(
        &self,
        batch_id: u64,
        event: &Event,
        dry_run: bool,
    ) -> Result<EventOutcome, SubmissionError> {
        let mut attachment_failures = 0;
        let mut attempt = 0;
        loop {
            if self.control.is_canceled(batch_id) {
                return Ok(EventOutcome::Canceled);
            }

            let error = match self
                .submit_event(batch_id, event, dry_run, &mut attachment_failures)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= self.backoff.max_attempts {
                error!(event_id = %event.id, attempts = attempt, "Max retries exceeded");
                return Err(SubmissionError::RetriesExhausted {
                    event_id: event.id.clone(),
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.backoff.delay(attempt - 1);
            warn!(
                event_id = %event.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Submission failed, retrying"
            );
            metrics::SUBMISSION_RETRIES.inc();
            let finished = wait_unless_canceled(delay, self.backoff.poll_slice, || {
                self.control.is_canceled(batch_id)
            })
            .await;
            if !finished {
                return Ok(EventOutcome::Canceled);
            }
        }
    }

    async fn submit_event(
        &self,
        batch_id: u64,
        event: &Event,
        dry_run: bool,
        attachment_failures: &mut u32,
    ) -> Result<EventOutcome, SubmissionError> {
        // Disk, not the store, is authoritative for "already submitted".
        if self.layout.has_service_request(&event.id).await? {
            info!(event_id = %event.id, "Event already has a service request");
            return Ok(EventOutcome::AlreadySubmitted);
        }

        let reviews = self.services.reviews.load(&event.id).await?;
        if !self.services.reviews.is_admissible(reviews) {
            return Err(SubmissionError::InsufficientReviews {
                event_id: event.id.clone(),
                have: reviews.map_or(0, |r| r.total_reviews),
                need: self.services.reviews.minimum(),
            });
        }

        let profile = self.profiles.resolve(event).ok_or_else(|| {
            SubmissionError::NoMatchingProfile {
                event_id: event.id.clone(),
                zones: event.zones.clone(),
            }
        })?;
        if profile.address.trim().is_empty() || profile.problem_description.trim().is_empty() {
            return Err(SubmissionError::IncompleteProfile {
                event_id: event.id.clone(),
            });
        }

        let (incident_date, incident_date_time) = incident_times(event.timestamp(), self.timezone);
        info!(
            event_id = %event.id,
            incident = %incident_date_time,
            zones = %event.zones.join(", "),
            "Submitting complaint"
        );

        let paths = self.layout.paths(&event.id)?;
        let bytes = file_size(&paths.clip)
            .await?
            .ok_or_else(|| SubmissionError::ClipMissing(event.id.clone()))?;
        if !self.services.clip_policy.is_valid(bytes) {
            return Err(SubmissionError::ClipSizeOutOfRange {
                event_id: event.id.clone(),
                megabytes: to_megabytes(bytes),
            });
        }

        let mut draft = ComplaintDraft {
            event_id: event.id.clone(),
            address: profile.address.clone(),
            description: profile.problem_description.clone(),
            incident_date: incident_date.clone(),
            incident_date_time: incident_date_time.clone(),
            attachment: Some(paths.clip.clone()),
        };

        let prepared = match self.services.portal.prepare(&draft).await {
            Ok(prepared) => prepared,
            Err(PortalError::AttachmentFailed(reason)) => {
                *attachment_failures += 1;
                let storage = match &self.services.object_storage {
                    Some(storage) if *attachment_failures > self.attachment_retries_before_fallback => {
                        storage
                    }
                    _ => return Err(PortalError::AttachmentFailed(reason).into()),
                };
                warn!(
                    event_id = %event.id,
                    failures = *attachment_failures,
                    "Clip attachment failed, falling back to object storage"
                );
                let url = storage.upload(&paths.object_key, &paths.clip).await?;
                metrics::FALLBACK_UPLOADS.inc();
                info!(event_id = %event.id, url = %url, "Clip uploaded to object storage");

                draft.attachment = None;
                draft.description = with_evidence_link(&url, &draft.description);
                self.services.portal.prepare(&draft).await?
            }
            Err(e) => return Err(e.into()),
        };

        if self.control.is_canceled(batch_id) {
            self.discard(&prepared).await;
            return Ok(EventOutcome::Canceled);
        }
        if dry_run {
            info!(event_id = %event.id, "Skipping submission for dry run");
            self.discard(&prepared).await;
            return Ok(EventOutcome::DryRun);
        }

        // Written before the irreversible submit so a crash between the two
        // leaves a marker that blocks automatic resubmission.
        let pending = ServiceRequest::pending(incident_date, incident_date_time);
        if let Err(e) = self.record_pending(&event.id, &pending).await {
            self.abandon_pending(&prepared).await;
            return Err(e);
        }

        let number = self
            .services
            .portal
            .confirm(&prepared)
            .await
            .map_err(|source| SubmissionError::ConfirmationLost {
                event_id: event.id.clone(),
                source,
            })?;
        info!(event_id = %event.id, request_number = %number, "Service request submitted");

        let confirmed = pending.confirmed(number.clone());
        self.services
            .store
            .update(&event.id, |state| state.with_service_request(confirmed.clone()))?;
        self.layout.write_service_request(&event.id, &confirmed).await?;
        self.services
            .watermark
            .write(&SubmissionRun {
                last_run_time: event.timestamp(),
            })
            .await?;
        self.services.store.save().await?;

        Ok(EventOutcome::Submitted {
            request_number: number,
        })
    }

    async fn record_pending(
        &self,
        event_id: &str,
        pending: &ServiceRequest,
    ) -> Result<(), SubmissionError> {
        self.layout.write_service_request(event_id, pending).await?;
        self.services
            .store
            .update(event_id, |state| state.with_service_request(pending.clone()))?;
        self.services.store.save().await?;
        Ok(())
    }

    /// Undo a pending marker that never reached the portal.
    async fn abandon_pending(&self, prepared: &PreparedComplaint) {
        self.discard(prepared).await;
        // NotFound here means the store update itself failed.
        let _ = self.services.store.update(&prepared.event_id, |mut state| {
            state.service_request = None;
            state
        });
        if let Err(e) = self.layout.remove_service_request(&prepared.event_id).await {
            error!(
                event_id = %prepared.event_id,
                error = %e,
                "Failed to remove pending service request, clear it manually"
            );
        }
    }

    async fn discard(&self, prepared: &PreparedComplaint) {
        if let Err(e) = self.services.portal.discard(prepared).await {
            warn!(event_id = %prepared.event_id, error = %e, "Failed to discard complaint form");
        }
    }

    /// Upload one event's clip to object storage. Returns its public URL.
    pub async fn upload_to_storage(&self, event_id: &str) -> Result<String, SubmissionError> {
        let storage = self
            .services
            .object_storage
            .as_ref()
            .ok_or(StorageError::NotConfigured)?;
        let paths = self.layout.paths(event_id)?;
        if file_size(&paths.clip).await?.is_none() {
            return Err(SubmissionError::ClipMissing(event_id.to_string()));
        }
        let url = storage.upload(&paths.object_key, &paths.clip).await?;
        info!(event_id, url = %url, "Clip uploaded to object storage");
        Ok(url)
    }
}

/// Incident date (`MM/DD/YYYY`) and date-time (`MM/DD/YYYY h:mm AM`) in `zone`.
pub fn incident_times(timestamp: DateTime<Utc>, zone: Tz) -> (String, String) {
    let local = timestamp.with_timezone(&zone);
    let date = local.format("%m/%d/%Y").to_string();
    let time = local.format("%-I:%M %p").to_string();
    let date_time = format!("{} {}", date, time);
    (date, date_time)
}

fn with_evidence_link(url: &str, description: &str) -> String {
    format!(
        "Video evidence here: {} (The complaint website is not accepting file uploads.)\n{}",
        url, description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incident_times_in_new_york() {
        // 2024-01-15 14:05:00 UTC is 9:05 AM in New York (EST).
        let ts = DateTime::from_timestamp(1_705_327_500, 0).unwrap();
        let (date, date_time) = incident_times(ts, chrono_tz::America::New_York);
        assert_eq!(date, "01/15/2024");
        assert_eq!(date_time, "01/15/2024 9:05 AM");
    }

    #[test]
    fn test_incident_date_uses_local_day() {
        // 2024-07-04 02:30 UTC is still July 3rd in New York (EDT).
        let ts = DateTime::from_timestamp(1_720_060_200, 0).unwrap();
        let (date, date_time) = incident_times(ts, chrono_tz::America::New_York);
        assert_eq!(date, "07/03/2024");
        assert_eq!(date_time, "07/03/2024 10:30 PM");
    }

    #[test]
    fn test_evidence_link_is_prepended() {
        let text = with_evidence_link("https://clips/x/clip.mp4", "Riding on sidewalk");
        assert!(text.starts_with("Video evidence here: https://clips/x/clip.mp4"));
        assert!(text.ends_with("\nRiding on sidewalk"));
    }
}
