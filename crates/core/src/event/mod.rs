//! Event data model: source events, their tracked state and the
//! complaint records attached to them.

mod types;

pub use types::{
    epoch_seconds, BoundingBox, Detection, Event, EventDatabase, EventState, ServiceRequest,
    ServiceRequestStatus, StatusAddress, SubmissionRun, CLOSED_STATUS_CODE,
    PENDING_REQUEST_NUMBER,
};
