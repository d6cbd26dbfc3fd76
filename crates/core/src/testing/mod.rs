//! Testing utilities and mock implementations of the external capabilities.
//!
//! Every trait the pipelines call out through has a mock here, so the whole
//! event lifecycle can be exercised without an NVR, a complaint site or a
//! status API.
//!
//! # Example
//!
//! ```rust,ignore
//! use nvr_report_core::testing::{fixtures, MockEventSource, MockComplaintPortal};
//!
//! let source = MockEventSource::new();
//! source.set_events(vec![fixtures::event("a", 100.0, 110.0)]).await;
//!
//! let portal = MockComplaintPortal::new();
//! portal.fail_attachments(2).await;
//! ```

mod mock_event_source;
mod mock_portal;
mod mock_status_api;

pub use mock_event_source::{ClipResponse, DownloadGate, MockEventSource};
pub use mock_portal::{MockComplaintPortal, MockObjectStorage};
pub use mock_status_api::MockStatusApi;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::artifacts::ArtifactLayout;
    use crate::event::{
        Detection, Event, ServiceRequest, ServiceRequestStatus, CLOSED_STATUS_CODE,
    };
    use crate::ingestion::IngestionConfig;
    use crate::review::ReviewStatus;
    use crate::submission::{SubmissionConfig, ZoneProfile};

    /// Smallest config that parses, with both credentials set.
    pub const MINIMAL_CONFIG: &str = r#"
[storage]
events_dir = "/data/events"
staging_dir = "/data/staging"

[source]
url = "http://frigate:5000"

[portal]
url = "http://portal:8000"
api_key = "portal-secret"

[resolution]
url = "https://status.example.org/GetServiceRequest"
api_key = "status-secret"
"#;

    /// Zone every fixture event is in unless stated otherwise.
    pub const DEFAULT_ZONE: &str = "sidewalk";

    /// Create an event in [`DEFAULT_ZONE`].
    pub fn event(id: &str, start: f64, end: f64) -> Event {
        event_in_zones(id, start, end, &[DEFAULT_ZONE])
    }

    pub fn event_in_zones(id: &str, start: f64, end: f64, zones: &[&str]) -> Event {
        Event {
            id: id.to_string(),
            start_time: start,
            end_time: Some(end),
            zones: zones.iter().map(|z| z.to_string()).collect(),
            data: Detection {
                bounding_box: Some([0.1, 0.2, 0.3, 0.4]),
                region: Some([0.0, 0.0, 1.0, 1.0]),
                score: Some(0.8),
                top_score: Some(0.9),
            },
        }
    }

    pub fn service_request(number: &str) -> ServiceRequest {
        ServiceRequest::pending("01/15/2024", "01/15/2024 9:05 AM").confirmed(number)
    }

    pub fn open_status(number: &str) -> ServiceRequestStatus {
        ServiceRequestStatus {
            sr_number: Some(number.to_string()),
            status: Some("614110001".to_string()),
            resolution_action: Some("The Police Department responded to the complaint.".to_string()),
            ..ServiceRequestStatus::default()
        }
    }

    pub fn closed_status(number: &str) -> ServiceRequestStatus {
        ServiceRequestStatus {
            sr_number: Some(number.to_string()),
            status: Some(CLOSED_STATUS_CODE.to_string()),
            resolution_action: Some("The Police Department issued a summons.".to_string()),
            ..ServiceRequestStatus::default()
        }
    }

    /// `events/` and `staging/` under `root`.
    pub fn layout(root: impl AsRef<Path>) -> ArtifactLayout {
        let root = root.as_ref();
        ArtifactLayout::new(root.join("events"), root.join("staging"))
            .expect("distinct directories")
    }

    pub fn profile(zones: &[&str]) -> ZoneProfile {
        ZoneProfile {
            zone_names: zones.iter().map(|z| z.to_string()).collect(),
            address: "100 Main Street".to_string(),
            problem_description: "Cyclist riding on the sidewalk".to_string(),
        }
    }

    /// Ingestion settings without pacing or retry delays.
    pub fn fast_ingestion_config() -> IngestionConfig {
        IngestionConfig {
            download_retry_delay_ms: 1,
            download_pacing_ms: 0,
            ..IngestionConfig::default()
        }
    }

    /// Submission settings with millisecond backoff and a profile for
    /// [`DEFAULT_ZONE`].
    pub fn fast_submission_config() -> SubmissionConfig {
        SubmissionConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            backoff_unit_ms: 1,
            max_delay_ms: 10,
            poll_slice_ms: 1,
            profiles: vec![profile(&[DEFAULT_ZONE])],
            ..SubmissionConfig::default()
        }
    }

    /// Write `event.json` for a saved event.
    pub async fn write_saved_event(layout: &ArtifactLayout, event: &Event) {
        let document = serde_json::to_value(event).unwrap();
        layout.write_metadata(&event.id, &document).await.unwrap();
    }

    async fn write_sized(path: &Path, bytes: u64) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let file = tokio::fs::File::create(path).await.unwrap();
        file.set_len(bytes).await.unwrap();
    }

    pub async fn write_staged_clip(layout: &ArtifactLayout, event_id: &str, bytes: u64) {
        write_sized(&layout.paths(event_id).unwrap().staged_clip, bytes).await;
    }

    pub async fn write_clip(layout: &ArtifactLayout, event_id: &str, bytes: u64) {
        write_sized(&layout.paths(event_id).unwrap().clip, bytes).await;
    }

    pub async fn write_reviews(layout: &ArtifactLayout, event_id: &str, total_reviews: u32) {
        crate::artifacts::write_json(
            &layout.paths(event_id).unwrap().review,
            &ReviewStatus { total_reviews },
        )
        .await
        .unwrap();
    }
}
