//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion (clip downloads, retries, size rejections)
//! - Overlap resolution (deletions by reason)
//! - Submission (outcomes, retries, fallback uploads)
//! - Resolution tracking (polls, rate-limit waits)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ingestion Metrics
// =============================================================================

/// Clip downloads by destination.
pub static CLIPS_DOWNLOADED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("nvr_report_clips_downloaded_total", "Clips downloaded"),
        &["target"], // "final", "staging"
    )
    .unwrap()
});

/// Failed clip download attempts by reason.
pub static CLIP_DOWNLOAD_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nvr_report_clip_download_failures_total",
            "Failed clip download attempts",
        ),
        &["reason"], // "source_error", "too_small", "too_large"
    )
    .unwrap()
});

/// Downloaded clip sizes in megabytes.
pub static CLIP_SIZE_MB: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("nvr_report_clip_size_megabytes", "Size of downloaded clips")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 74.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Overlap Metrics
// =============================================================================

/// Events deleted from the source by reason.
pub static OVERLAP_DELETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nvr_report_overlap_deletions_total",
            "Events deleted from the source system",
        ),
        &["reason"], // "too_long", "overlap"
    )
    .unwrap()
});

// =============================================================================
// Submission Metrics
// =============================================================================

/// Per-event submission results.
pub static SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("nvr_report_submissions_total", "Event submissions by outcome"),
        &["outcome"], // "submitted", "already_submitted", "skipped_overlap", "dry_run", "failed"
    )
    .unwrap()
});

/// Submission attempts that were retried after a transient error.
pub static SUBMISSION_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "nvr_report_submission_retries_total",
        "Submission attempts retried after a transient error",
    )
    .unwrap()
});

/// Clips uploaded to object storage instead of being attached.
pub static FALLBACK_UPLOADS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "nvr_report_fallback_uploads_total",
        "Clips uploaded to object storage as attachment fallback",
    )
    .unwrap()
});

/// Batch duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "nvr_report_submission_batch_duration_seconds",
            "Duration of submission batches",
        )
        .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["result"], // "completed", "canceled", "failed"
    )
    .unwrap()
});

// =============================================================================
// Resolution Metrics
// =============================================================================

/// Status polls by result.
pub static RESOLUTION_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("nvr_report_resolution_polls_total", "Status API polls"),
        &["result"], // "open", "closed", "error"
    )
    .unwrap()
});

/// Waits caused by status API rate limiting.
pub static RATE_LIMIT_WAITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "nvr_report_rate_limit_waits_total",
        "Waits caused by status API rate limiting",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Ingestion
        Box::new(CLIPS_DOWNLOADED.clone()),
        Box::new(CLIP_DOWNLOAD_FAILURES.clone()),
        Box::new(CLIP_SIZE_MB.clone()),
        // Overlap
        Box::new(OVERLAP_DELETIONS.clone()),
        // Submission
        Box::new(SUBMISSIONS.clone()),
        Box::new(SUBMISSION_RETRIES.clone()),
        Box::new(FALLBACK_UPLOADS.clone()),
        Box::new(BATCH_DURATION.clone()),
        // Resolution
        Box::new(RESOLUTION_POLLS.clone()),
        Box::new(RATE_LIMIT_WAITS.clone()),
    ]
}
