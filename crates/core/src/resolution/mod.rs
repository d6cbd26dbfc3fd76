//! Resolution tracker: polls the external status API for submitted events.

mod api;
mod config;
mod tracker;

pub use api::{HttpStatusApi, StatusApi, StatusApiError};
pub use config::ResolutionConfig;
pub use tracker::{ResolutionReport, ResolutionTracker};

use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Api(#[from] StatusApiError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
