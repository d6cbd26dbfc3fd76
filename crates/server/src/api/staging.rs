//! Staging API handlers.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use nvr_report_core::StagingReport;

use super::handlers::{internal_error, last_run_time, ApiError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FetchStagingRequest {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanStagingResponse {
    pub removed: Vec<String>,
}

/// POST /api/v1/staging/fetch
///
/// Stage clips for every event since the watermark.
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FetchStagingRequest>,
) -> Result<Json<StagingReport>, ApiError> {
    let after = last_run_time(&state).await?;
    state
        .services()
        .ingestion
        .stage_clips(after, Some(Utc::now()), request.dry_run)
        .await
        .map(Json)
        .map_err(internal_error)
}

/// DELETE /api/v1/staging
pub async fn clean(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanStagingResponse>, ApiError> {
    let removed = state
        .services()
        .ingestion
        .clean_staged_clips()
        .await
        .map_err(internal_error)?;
    Ok(Json(CleanStagingResponse { removed }))
}
