//! Resolution tracking handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use nvr_report_core::{ResolutionReport, ResolutionSummary};

use super::handlers::{internal_error, ApiError};
use crate::state::AppState;

/// POST /api/v1/resolutions/check
pub async fn check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResolutionReport>, ApiError> {
    state
        .services()
        .resolution
        .check_all()
        .await
        .map(Json)
        .map_err(internal_error)
}

/// GET /api/v1/resolutions/summary
pub async fn summary(State(state): State<Arc<AppState>>) -> Json<ResolutionSummary> {
    Json(ResolutionSummary::from_states(
        &state.services().store.states(),
    ))
}
