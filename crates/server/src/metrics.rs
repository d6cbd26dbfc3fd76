//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the report server:
//! - HTTP request metrics (latency, counts)
//! - Event store and submission batch status (collected on scrape)
//! - Everything registered by the core pipelines

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "nvr_report_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("nvr_report_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "nvr_report_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Status (collected on scrape)
// =============================================================================

/// Events tracked by the store.
pub static EVENTS_TRACKED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("nvr_report_events_tracked", "Events in the event store").unwrap()
});

/// Whether a submission batch is running (1) or not (0).
pub static SUBMISSION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "nvr_report_submission_active",
        "Whether a submission batch is running",
    )
    .unwrap()
});

/// Events processed in the current batch.
pub static SUBMISSION_PROCESSED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "nvr_report_submission_processed",
        "Events processed in the current submission batch",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Status
    registry.register(Box::new(EVENTS_TRACKED.clone())).unwrap();
    registry
        .register(Box::new(SUBMISSION_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(SUBMISSION_PROCESSED.clone()))
        .unwrap();

    // Core metrics (ingestion, overlap, submission, resolution)
    for metric in nvr_report_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Update status gauges from current application state.
pub fn collect_dynamic_metrics(state: &AppState) {
    let services = state.services();
    EVENTS_TRACKED.set(services.store.len() as i64);

    let status = services.submission.status();
    SUBMISSION_ACTIVE.set(if status.is_submitting() { 1 } else { 0 });
    SUBMISSION_PROCESSED.set(status.processed as i64);
}

/// Normalize a path for metric labels (replace event ids with a placeholder).
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let normalized = if previous == "events" && !segment.is_empty() {
                "{id}"
            } else {
                segment
            };
            previous = segment;
            normalized
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_event_id() {
        let path = "/api/v1/events/1700000000.123-abc/reviews";
        assert_eq!(normalize_path(path), "/api/v1/events/{id}/reviews");
    }

    #[test]
    fn test_normalize_path_trailing_id() {
        assert_eq!(normalize_path("/api/v1/events/abc"), "/api/v1/events/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("nvr_report_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        nvr_report_core::metrics::SUBMISSION_RETRIES.inc();
        EVENTS_TRACKED.set(0);
        SUBMISSION_ACTIVE.set(0);

        let output = encode_metrics();
        assert!(output.contains("nvr_report_submission_retries_total"));
        assert!(output.contains("nvr_report_events_tracked"));
        assert!(output.contains("nvr_report_submission_active"));
    }
}
