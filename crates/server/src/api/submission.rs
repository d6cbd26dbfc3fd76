//! Submission batch API handlers.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use nvr_report_core::SubmissionStatus;

use super::handlers::{api_error, ApiError, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartSubmissionRequest {
    /// Inclusive upper bound; everything after the watermark if absent.
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub canceled_batch_id: u64,
}

/// GET /api/v1/submission
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SubmissionStatus> {
    Json(state.services().submission.status())
}

/// POST /api/v1/submission
///
/// Start a batch in the background. Progress is visible through
/// `GET /api/v1/submission`.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSubmissionRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let pipeline = Arc::clone(&state.services().submission);
    if pipeline.is_submitting() {
        return Err(api_error(StatusCode::CONFLICT, "A submission batch is already running"));
    }

    info!(before = ?request.before, dry_run = request.dry_run, "Submission requested");
    tokio::spawn(async move {
        if let Err(e) = pipeline.run_batch(request.before, request.dry_run).await {
            error!(error = %e, "Submission batch failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Submission started".to_string(),
        }),
    ))
}

/// POST /api/v1/submission/cancel
pub async fn cancel(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    Json(CancelResponse {
        canceled_batch_id: state.services().submission.cancel(),
    })
}
