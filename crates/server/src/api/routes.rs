use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{
    events, handlers, middleware::metrics_middleware, overlaps, reports, resolutions, staging,
    submission,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Submission
        .route(
            "/submission",
            get(submission::get_status).post(submission::start),
        )
        .route("/submission/cancel", post(submission::cancel))
        // Staging
        .route("/staging/fetch", post(staging::fetch))
        .route("/staging", delete(staging::clean))
        // Overlaps
        .route("/overlaps/check", post(overlaps::check))
        // Resolution
        .route("/resolutions/check", post(resolutions::check))
        .route("/resolutions/summary", get(resolutions::summary))
        // Reports
        .route("/requests", get(reports::list_requests))
        .route("/reports/by-date", get(reports::by_date))
        // Events
        .route("/events", get(events::list))
        .route("/events/{id}/clip", get(events::clip))
        .route("/events/{id}/reviews", post(events::review))
        .route("/events/{id}", delete(events::delete_event));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
