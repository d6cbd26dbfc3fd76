use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request number written before the complaint portal confirms a submission.
pub const PENDING_REQUEST_NUMBER: &str = "pending";

/// Status code the resolution API reports for closed requests.
pub const CLOSED_STATUS_CODE: &str = "614110003";

/// `[x1, y1, x2, y2]` in frame pixels.
pub type BoundingBox = [f64; 4];

/// Detection metadata reported by the NVR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_score: Option<f64>,
}

/// A motion event as reported by the source NVR.
///
/// Times are epoch seconds. Events that are still recording have no end
/// time and are treated as zero length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub data: Detection,
}

impl Event {
    /// End of the detection window, falling back to the start time.
    pub fn end(&self) -> f64 {
        self.end_time.unwrap_or(self.start_time)
    }

    /// Length of the detection window in seconds.
    pub fn duration(&self) -> f64 {
        self.end() - self.start_time
    }

    /// Derived timestamp (the start of the detection window).
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = self.start_time.floor();
        let nanos = ((self.start_time - secs) * 1_000_000_000.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos).unwrap_or_default()
    }
}

/// Whole epoch seconds of a timestamp, as the source API expects.
pub fn epoch_seconds(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

/// Submission record for an event.
///
/// Field names match the on-disk `SR.json` artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub service_request_number: String,
    pub incident_date: String,
    pub incident_date_time: String,
}

impl ServiceRequest {
    /// Placeholder written before the portal confirms the submission.
    pub fn pending(incident_date: impl Into<String>, incident_date_time: impl Into<String>) -> Self {
        Self {
            service_request_number: PENDING_REQUEST_NUMBER.to_string(),
            incident_date: incident_date.into(),
            incident_date_time: incident_date_time.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.service_request_number == PENDING_REQUEST_NUMBER
    }

    /// Same incident fields with a confirmed request number.
    pub fn confirmed(&self, number: impl Into<String>) -> Self {
        Self {
            service_request_number: number.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusAddress {
    #[serde(default)]
    pub borough: Option<String>,
    #[serde(default)]
    pub full_address: Option<String>,
}

/// Resolution detail as returned by the city status API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRequestStatus {
    #[serde(rename = "SRNumber", default)]
    pub sr_number: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub problem_details: Option<String>,
    #[serde(default)]
    pub resolution_action_updated_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date_time_submitted: Option<String>,
    #[serde(default)]
    pub resolution_action: Option<String>,
    #[serde(default)]
    pub address: Option<StatusAddress>,
}

impl ServiceRequestStatus {
    pub fn is_closed(&self, closed_code: &str) -> bool {
        self.status.as_deref() == Some(closed_code)
    }
}

/// Tracked state of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventState {
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_request: Option<ServiceRequest>,
    #[serde(default)]
    pub has_resolution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_request_status: Option<ServiceRequestStatus>,
}

impl EventState {
    /// State for an event seen for the first time.
    pub fn new(event: Event) -> Self {
        Self {
            event,
            service_request: None,
            has_resolution: false,
            service_request_status: None,
        }
    }

    pub fn with_service_request(mut self, service_request: ServiceRequest) -> Self {
        self.service_request = Some(service_request);
        self
    }
}

/// Serialized shape of the event store snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDatabase {
    pub events: HashMap<String, EventState>,
}

/// Submission watermark: timestamp of the last processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRun {
    pub last_run_time: DateTime<Utc>,
}
