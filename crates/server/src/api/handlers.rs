use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use nvr_report_core::SanitizedConfig;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub events: usize,
    pub submitting: bool,
}

/// Error body shared by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub fn internal_error(error: impl ToString) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, error)
}

/// Lower bound for staging and overlap checks: the submission watermark.
pub async fn last_run_time(state: &AppState) -> Result<DateTime<Utc>, ApiError> {
    match state.services().submission.watermark().read().await {
        Ok(Some(run)) => Ok(run.last_run_time),
        Ok(None) => Err(api_error(
            StatusCode::CONFLICT,
            "No submission watermark, seed it first",
        )),
        Err(e) => Err(internal_error(e)),
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let services = state.services();
    Json(HealthResponse {
        status: "ok".to_string(),
        events: services.store.len(),
        submitting: services.submission.is_submitting(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
