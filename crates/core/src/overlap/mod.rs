//! Overlap resolver: finds duplicate or overlong events in a window and
//! deletes them from the source.

mod config;
mod planner;
mod resolver;

pub use config::OverlapConfig;
pub use planner::{overlap_percent, plan_deletions, DeletionReason, PlannedDeletion};
pub use resolver::OverlapResolver;

use thiserror::Error;

use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum OverlapError {
    #[error(transparent)]
    Source(#[from] SourceError),
}
