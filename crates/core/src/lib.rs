pub mod artifacts;
pub mod config;
pub mod event;
pub mod ingestion;
pub mod metrics;
pub mod overlap;
pub mod reports;
pub mod resolution;
pub mod review;
pub mod single_flight;
pub mod source;
pub mod store;
pub mod submission;
pub mod testing;

pub use artifacts::{ArtifactError, ArtifactLayout, EventPaths};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use event::{
    Event, EventDatabase, EventState, ServiceRequest, ServiceRequestStatus, SubmissionRun,
};
pub use ingestion::{IngestionError, IngestionPipeline, StagingReport};
pub use overlap::{OverlapError, OverlapResolver, PlannedDeletion};
pub use reports::{list_service_requests, ReportsByDate, ResolutionSummary};
pub use resolution::{ResolutionError, ResolutionReport, ResolutionTracker};
pub use review::{ReviewEntry, ReviewError, ReviewGate, ReviewQueue, ReviewStatus};
pub use single_flight::SingleFlight;
pub use source::{EventSource, FrigateClient, SourceError};
pub use store::{EventStore, StoreError};
pub use submission::{
    BatchReport, SubmissionError, SubmissionPipeline, SubmissionServices, SubmissionStatus,
};
