//! Submission pipeline: batches of reviewed events pushed through the
//! complaint portal, with retries, cancellation and crash-safe recording of
//! request numbers.

mod backoff;
mod config;
mod control;
mod pipeline;
mod portal;
mod profile;
mod storage;
mod types;
mod watermark;

pub use backoff::{wait_unless_canceled, BackoffPolicy};
pub use config::{ObjectStorageConfig, PortalConfig, SubmissionConfig, ZoneProfile};
pub use control::BatchControl;
pub use pipeline::{incident_times, SubmissionPipeline, SubmissionServices};
pub use portal::{ComplaintDraft, ComplaintPortal, HttpPortalClient, PortalError, PreparedComplaint};
pub use profile::ProfileTable;
pub use storage::{HttpObjectStorage, ObjectStorage, StorageError};
pub use types::{
    BatchReport, EventOutcome, EventResult, SubmissionError, SubmissionPhase, SubmissionStatus,
};
pub use watermark::Watermark;
