//! Report handlers.

use axum::{extract::State, http::header, response::IntoResponse, Json};
use std::sync::Arc;

use nvr_report_core::{list_service_requests, ReportsByDate};

use crate::state::AppState;

/// GET /api/v1/requests
///
/// Submitted requests as CSV.
pub async fn list_requests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let csv = list_service_requests(&state.services().store.states());
    ([(header::CONTENT_TYPE, "text/csv")], csv)
}

/// GET /api/v1/reports/by-date
pub async fn by_date(State(state): State<Arc<AppState>>) -> Json<ReportsByDate> {
    Json(ReportsByDate::from_states(&state.services().store.states()))
}
