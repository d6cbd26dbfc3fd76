//! Overlap check handler.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use nvr_report_core::PlannedDeletion;

use super::handlers::{internal_error, last_run_time, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OverlapCheckResponse {
    pub deleted: Vec<PlannedDeletion>,
}

/// POST /api/v1/overlaps/check
///
/// Deletes too-long and overlapping events since the watermark from the NVR.
pub async fn check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OverlapCheckResponse>, ApiError> {
    let after = last_run_time(&state).await?;
    let deleted = state
        .services()
        .overlaps
        .resolve_overlaps(after, Some(Utc::now()))
        .await
        .map_err(internal_error)?;
    Ok(Json(OverlapCheckResponse { deleted }))
}
