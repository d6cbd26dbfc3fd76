//! Per-event handlers: the review queue, clip playback, review votes and
//! manual deletion.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;

use nvr_report_core::{
    artifacts::validate_event_id, ArtifactError, ReviewError, ReviewQueue, SourceError,
    SubmissionError,
};

use super::handlers::{api_error, internal_error, ApiError, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    /// The count the reviewer saw plus one.
    pub total_reviews: u32,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub accepted: bool,
    pub total_reviews: u32,
    pub admissible: bool,
}

/// GET /api/v1/events
///
/// Events after the watermark with their review progress and the latest
/// `before` bound that only covers fully reviewed events.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<ReviewQueue>, ApiError> {
    let services = state.services();
    let (_, events) = services
        .submission
        .pending_events()
        .await
        .map_err(|e| match e {
            SubmissionError::MissingWatermark => api_error(StatusCode::CONFLICT, e),
            SubmissionError::Source(_) => api_error(StatusCode::BAD_GATEWAY, e),
            e => internal_error(e),
        })?;
    let queue = services.reviews.queue(&events).await.map_err(review_error)?;
    Ok(Json(queue))
}

/// GET /api/v1/events/{id}/clip
///
/// Serve the staged clip. `Range` requests get partial content.
pub async fn clip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let paths = state
        .services()
        .layout
        .paths(&id)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    if !tokio::fs::try_exists(&paths.staged_clip)
        .await
        .unwrap_or(false)
    {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No staged clip for event {}", id),
        ));
    }

    let response = match ServeFile::new(&paths.staged_clip).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.map(Body::new))
}

/// POST /api/v1/events/{id}/reviews
///
/// Record one review. Stale or out-of-range counts are ignored, not
/// rejected, so double-clicks are harmless.
pub async fn review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let reviews = &state.services().reviews;
    let accepted = reviews
        .increment(&id, request.total_reviews)
        .await
        .map_err(review_error)?;
    let current = reviews.load(&id).await.map_err(review_error)?;

    Ok(Json(ReviewResponse {
        accepted,
        total_reviews: current.map_or(0, |c| c.total_reviews),
        admissible: reviews.is_admissible(current),
    }))
}

/// DELETE /api/v1/events/{id}
///
/// Delete an event from the NVR. Irreversible.
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_event_id(&id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    match state.services().ingestion.source().delete_event(&id).await {
        Ok(()) => {
            info!(event_id = %id, "Event deleted by operator");
            Ok(Json(MessageResponse {
                message: format!("Deleted event {}", id),
            }))
        }
        Err(SourceError::NotFound(_)) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Event not found: {}", id),
        )),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e)),
    }
}

fn review_error(error: ReviewError) -> ApiError {
    match error {
        ReviewError::Artifact(ArtifactError::InvalidEventId(_)) => {
            api_error(StatusCode::BAD_REQUEST, error)
        }
        e => internal_error(e),
    }
}
