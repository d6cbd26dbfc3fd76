use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::artifacts::ArtifactLayout;
use crate::event::{EventState, ServiceRequestStatus};
use crate::metrics;
use crate::single_flight::SingleFlight;
use crate::store::EventStore;

use super::{ResolutionConfig, ResolutionError, StatusApi, StatusApiError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    /// Another pass was running; nothing was checked.
    pub skipped: bool,
    pub checked: usize,
    pub resolved: Vec<String>,
    pub open: Vec<String>,
}

/// Polls the status API for submitted events until they close.
pub struct ResolutionTracker {
    api: Arc<dyn StatusApi>,
    store: Arc<EventStore>,
    layout: ArtifactLayout,
    closed_status: String,
    rate_limit_wait: Duration,
    flight: SingleFlight,
}

impl ResolutionTracker {
    pub fn new(
        api: Arc<dyn StatusApi>,
        store: Arc<EventStore>,
        layout: ArtifactLayout,
        config: &ResolutionConfig,
    ) -> Self {
        Self {
            api,
            store,
            layout,
            closed_status: config.closed_status.clone(),
            rate_limit_wait: Duration::from_secs(config.rate_limit_wait_secs),
            flight: SingleFlight::new(),
        }
    }

    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Check every submitted, unresolved event once.
    ///
    /// Rate limiting is waited out indefinitely; any other API failure aborts
    /// the pass. The store is saved either way.
    pub async fn check_all(&self) -> Result<ResolutionReport, ResolutionError> {
        let Some(_flight) = self.flight.try_begin() else {
            info!("Resolution check already running");
            return Ok(ResolutionReport {
                skipped: true,
                ..ResolutionReport::default()
            });
        };

        let mut report = ResolutionReport::default();
        let result = self.check_unresolved(&mut report).await;
        self.store.save().await?;
        result?;

        info!(
            checked = report.checked,
            resolved = report.resolved.len(),
            "Done checking service request resolution"
        );
        Ok(report)
    }

    async fn check_unresolved(&self, report: &mut ResolutionReport) -> Result<(), ResolutionError> {
        let unresolved: Vec<EventState> = self
            .store
            .states()
            .into_iter()
            .filter(|state| !state.has_resolution && state.service_request.is_some())
            .collect();

        for state in unresolved {
            let event_id = state.event.id;
            let Some(request) = state.service_request else {
                continue;
            };
            if request.is_pending() {
                warn!(event_id = %event_id, "Service request still pending, needs manual resolution");
                continue;
            }

            let status = self.fetch_status(&request.service_request_number).await?;
            report.checked += 1;

            let closed = status.is_closed(&self.closed_status);
            let action = status.resolution_action.clone().unwrap_or_default();
            if closed {
                self.layout.write_resolution(&event_id, &status).await?;
                metrics::RESOLUTION_POLLS.with_label_values(&["closed"]).inc();
                info!(event_id = %event_id, action = %action, "Resolved");
                report.resolved.push(event_id.clone());
            } else {
                metrics::RESOLUTION_POLLS.with_label_values(&["open"]).inc();
                info!(event_id = %event_id, status = ?status.status, action = %action, "Not resolved");
                report.open.push(event_id.clone());
            }

            self.store.update(&event_id, |mut state| {
                state.has_resolution = closed;
                state.service_request_status = Some(status);
                state
            })?;
        }
        Ok(())
    }

    async fn fetch_status(&self, request_number: &str) -> Result<ServiceRequestStatus, ResolutionError> {
        loop {
            match self.api.get_status(request_number).await {
                Ok(status) => return Ok(status),
                Err(StatusApiError::RateLimited) => {
                    metrics::RATE_LIMIT_WAITS.inc();
                    warn!(
                        request_number,
                        wait_secs = self.rate_limit_wait.as_secs(),
                        "Status API rate limited, waiting"
                    );
                    tokio::time::sleep(self.rate_limit_wait).await;
                }
                Err(e) => {
                    metrics::RESOLUTION_POLLS.with_label_values(&["error"]).inc();
                    return Err(e.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ServiceRequest, CLOSED_STATUS_CODE};
    use crate::testing::{fixtures, MockStatusApi};
    use tempfile::TempDir;

    struct Harness {
        _temp: TempDir,
        api: Arc<MockStatusApi>,
        store: Arc<EventStore>,
        layout: ArtifactLayout,
        tracker: ResolutionTracker,
    }

    fn harness() -> Harness {
        let temp = TempDir::new().unwrap();
        let layout = fixtures::layout(&temp);
        let api = Arc::new(MockStatusApi::new());
        let store = Arc::new(EventStore::new(temp.path().join("db.json")));
        let config = ResolutionConfig {
            url: "http://status".to_string(),
            api_key: String::new(),
            rate_limit_wait_secs: 60,
            closed_status: CLOSED_STATUS_CODE.to_string(),
            timeout_secs: 5,
        };
        let tracker = ResolutionTracker::new(api.clone(), store.clone(), layout.clone(), &config)
            .with_rate_limit_wait(Duration::from_millis(1));
        Harness {
            _temp: temp,
            api,
            store,
            layout,
            tracker,
        }
    }

    fn submitted(store: &EventStore, id: &str, number: &str) {
        let state = EventState::new(fixtures::event(id, 100.0, 110.0))
            .with_service_request(fixtures::service_request(number));
        store.create(id, state).unwrap();
    }

    #[tokio::test]
    async fn test_closed_request_is_resolved() {
        let h = harness();
        submitted(&h.store, "a", "311-1");
        submitted(&h.store, "b", "311-2");
        h.api.set_status("311-1", fixtures::closed_status("311-1")).await;
        h.api.set_status("311-2", fixtures::open_status("311-2")).await;

        let report = h.tracker.check_all().await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.resolved, vec!["a"]);
        assert_eq!(report.open, vec!["b"]);
        assert!(h.store.get("a").unwrap().has_resolution);
        let b = h.store.get("b").unwrap();
        assert!(!b.has_resolution);
        assert!(b.service_request_status.is_some());
        assert!(h.layout.has_resolution("a").await.unwrap());
        assert!(!h.layout.has_resolution("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limit_retries_same_request() {
        let h = harness();
        submitted(&h.store, "a", "311-1");
        h.api.set_status("311-1", fixtures::closed_status("311-1")).await;
        h.api.rate_limit_next(3).await;

        let report = h.tracker.check_all().await.unwrap();

        assert_eq!(report.resolved, vec!["a"]);
        assert_eq!(h.api.requests().await, vec!["311-1"; 4]);
    }

    #[tokio::test]
    async fn test_skips_pending_and_resolved() {
        let h = harness();
        let pending = EventState::new(fixtures::event("p", 100.0, 110.0))
            .with_service_request(ServiceRequest::pending("01/01/2024", "01/01/2024 9:00 AM"));
        h.store.create("p", pending).unwrap();
        submitted(&h.store, "done", "311-9");
        h.store
            .update("done", |mut s| {
                s.has_resolution = true;
                s
            })
            .unwrap();
        h.store
            .create("new", EventState::new(fixtures::event("new", 1.0, 2.0)))
            .unwrap();

        let report = h.tracker.check_all().await.unwrap();
        assert_eq!(report.checked, 0);
        assert!(h.api.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_api_error_aborts_pass() {
        let h = harness();
        submitted(&h.store, "a", "311-1");
        h.api
            .fail_next(StatusApiError::ApiError("HTTP 500".to_string()))
            .await;

        let err = h.tracker.check_all().await.unwrap_err();
        assert!(matches!(err, ResolutionError::Api(_)));
        assert!(!h.store.get("a").unwrap().has_resolution);
    }
}
