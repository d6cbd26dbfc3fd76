//! End-to-end API tests with mocked external dependencies.
//!
//! These tests run the full router in-process with mock implementations of
//! the NVR, complaint portal, object storage and status API.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};

use nvr_report_core::SourceError;

use common::{fixtures, TestFixture};

const BASE: f64 = 1_700_000_000.0;

/// Poll the submission status until the running batch has finished.
async fn wait_for_batch(fixture: &TestFixture) -> Value {
    for _ in 0..500 {
        let response = fixture.get("/api/v1/submission").await;
        if response.body["phase"]["state"] == "idle"
            && (!response.body["last_report"].is_null() || !response.body["last_error"].is_null())
        {
            return response.body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("submission batch did not finish");
}

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["events"], 0);
    assert_eq!(response.body["submitting"], false);
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["portal"]["credential_configured"], true);
    assert_eq!(response.body["object_storage"]["credential_configured"], true);
    assert_eq!(response.body["submission"]["profile_count"], 1);
    assert!(!response.text.contains("portal-secret"));
    assert!(!response.text.contains("status-secret"));
    assert!(!response.text.contains("storage-secret"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("nvr_report_events_tracked"));
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn test_review_increments_only_by_one() {
    let fixture = TestFixture::new().await;
    let path = "/api/v1/events/a/reviews";

    let response = fixture.post(path, json!({ "total_reviews": 1 })).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["accepted"], true);
    assert_eq!(response.body["total_reviews"], 1);
    assert_eq!(response.body["admissible"], false);

    // A stale double-click is ignored.
    let response = fixture.post(path, json!({ "total_reviews": 1 })).await;
    assert_eq!(response.body["accepted"], false);
    assert_eq!(response.body["total_reviews"], 1);

    let response = fixture.post(path, json!({ "total_reviews": 2 })).await;
    assert_eq!(response.body["accepted"], true);
    assert_eq!(response.body["admissible"], true);

    // Never beyond the quorum.
    let response = fixture.post(path, json!({ "total_reviews": 3 })).await;
    assert_eq!(response.body["accepted"], false);
    assert_eq!(response.body["total_reviews"], 2);
}

#[tokio::test]
async fn test_review_requires_body() {
    let fixture = TestFixture::new().await;
    let response = fixture.post("/api/v1/events/a/reviews", json!({})).await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_review_rejects_escaping_event_id() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            "/api/v1/events/..%2F..%2Fescaped/reviews",
            json!({ "total_reviews": 1 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("invalid event id"));
    let outside = fixture.temp_dir.path().parent().unwrap().join("escaped");
    assert!(!outside.join("review.json").exists());
}

#[tokio::test]
async fn test_list_events_with_review_progress() {
    let fixture = TestFixture::new().await;
    let reviewed = vec![
        fixtures::event("a", BASE + 100.0, BASE + 110.0),
        fixtures::event("b", BASE + 200.0, BASE + 210.0),
    ];
    fixture.stage_reviewed(reviewed.clone()).await;
    let mut events = reviewed;
    events.push(fixtures::event("c", BASE + 300.0, BASE + 310.0));
    fixture.source.set_events(events).await;

    let response = fixture.get("/api/v1/events").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["minimum_reviews"], 2);

    let events = response.body["events"].as_array().unwrap();
    let ids: Vec<&str> = events
        .iter()
        .map(|e| e["event_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(events[1]["total_reviews"], 2);
    assert_eq!(events[1]["admissible"], true);
    assert_eq!(events[2]["total_reviews"], 0);
    assert_eq!(events[2]["staged"], false);

    // "b" is the last event before the first unreviewed one.
    let suggested = response.body["suggested_before"].as_str().unwrap();
    let suggested = chrono::DateTime::parse_from_rfc3339(suggested).unwrap();
    assert_eq!(suggested.timestamp(), (BASE + 200.0) as i64);
}

#[tokio::test]
async fn test_list_events_without_watermark_conflicts() {
    let fixture = TestFixture::unseeded().await;
    let response = fixture.get("/api/v1/events").await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_clip_honors_range() {
    let fixture = TestFixture::new().await;
    fixtures::write_staged_clip(&fixture.layout, "a", 4096).await;

    let response = fixture
        .get_with_headers("/api/v1/events/a/clip", &[("Range", "bytes=0-99")])
        .await;
    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers["content-range"], "bytes 0-99/4096");
    assert_eq!(response.headers["content-type"], "video/mp4");
    assert_eq!(response.bytes.len(), 100);

    let response = fixture
        .get_with_headers("/api/v1/events/a/clip", &[("Range", "bytes=4000-")])
        .await;
    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers["content-range"], "bytes 4000-4095/4096");
    assert_eq!(response.bytes.len(), 96);

    let response = fixture.get("/api/v1/events/a/clip").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.bytes.len(), 4096);
}

#[tokio::test]
async fn test_clip_unsatisfiable_range() {
    let fixture = TestFixture::new().await;
    fixtures::write_staged_clip(&fixture.layout, "a", 4096).await;

    let response = fixture
        .get_with_headers("/api/v1/events/a/clip", &[("Range", "bytes=5000-6000")])
        .await;
    assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_clip_missing_or_invalid() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/events/none/clip").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = fixture.get("/api/v1/events/..%2Fstaging/clip").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Staging
// =============================================================================

#[tokio::test]
async fn test_staging_fetch_and_clean() {
    let fixture = TestFixture::new().await;
    fixture
        .source
        .set_events(vec![fixtures::event("a", BASE + 100.0, BASE + 110.0)])
        .await;

    let response = fixture
        .post("/api/v1/staging/fetch", json!({ "dry_run": true }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["would_download"], json!(["a"]));
    assert_eq!(fixture.source.clip_download_count("a").await, 0);

    let response = fixture
        .post("/api/v1/staging/fetch", json!({ "dry_run": false }))
        .await;
    assert_eq!(response.body["downloaded"], json!(["a"]));
    assert!(fixture.layout.paths("a").unwrap().staged_clip.exists());

    let response = fixture.delete("/api/v1/staging").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["removed"], json!(["a"]));
    assert!(!fixture.layout.paths("a").unwrap().staged_clip.exists());
}

#[tokio::test]
async fn test_staging_fetch_without_watermark_conflicts() {
    let fixture = TestFixture::unseeded().await;
    let response = fixture.post("/api/v1/staging/fetch", json!({})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["error"].as_str().unwrap().contains("watermark"));
}

// =============================================================================
// Overlaps and deletion
// =============================================================================

#[tokio::test]
async fn test_overlap_check_deletes_long_events() {
    let fixture = TestFixture::new().await;
    fixture
        .source
        .set_events(vec![
            fixtures::event("long", BASE + 100.0, BASE + 160.0),
            fixtures::event("short", BASE + 300.0, BASE + 310.0),
        ])
        .await;

    let response = fixture.post("/api/v1/overlaps/check", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    let deleted = response.body["deleted"].as_array().unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["event_id"], "long");
    assert_eq!(fixture.source.deleted_events().await, vec!["long"]);
}

#[tokio::test]
async fn test_delete_event() {
    let fixture = TestFixture::new().await;

    let response = fixture.delete("/api/v1/events/a").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fixture.source.deleted_events().await, vec!["a"]);

    fixture
        .source
        .fail_delete("gone", SourceError::NotFound("gone".to_string()))
        .await;
    let response = fixture.delete("/api/v1/events/gone").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    fixture
        .source
        .fail_delete("down", SourceError::Timeout)
        .await;
    let response = fixture.delete("/api/v1/events/down").await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    let response = fixture.delete("/api/v1/events/..%2Fapi").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(fixture.source.deleted_events().await, vec!["a"]);
}

// =============================================================================
// Submission, reports and resolution
// =============================================================================

#[tokio::test]
async fn test_submission_then_reports_and_resolution() {
    let fixture = TestFixture::new().await;
    fixture
        .stage_reviewed(vec![
            fixtures::event("a", BASE + 100.0, BASE + 110.0),
            fixtures::event("b", BASE + 200.0, BASE + 210.0),
        ])
        .await;

    let response = fixture.post("/api/v1/submission", json!({})).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let status = wait_for_batch(&fixture).await;
    assert!(status["last_error"].is_null());
    let results = status["last_report"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["event_id"], "a");
    assert_eq!(results[0]["outcome"], "submitted");
    assert_eq!(results[0]["request_number"], "311-1");

    let response = fixture.get("/api/v1/requests").await;
    assert_eq!(response.status, StatusCode::OK);
    let header = response.text.lines().next().unwrap();
    assert!(header.starts_with("\"serviceRequestNumber\""));
    assert!(response.text.contains("\"311-1\""));
    assert!(response.text.contains("\"311-2\""));

    let response = fixture.get("/api/v1/reports/by-date").await;
    assert_eq!(response.body["total"], 2);

    fixture
        .status_api
        .set_status("311-1", fixtures::closed_status("311-1"))
        .await;
    let response = fixture.post("/api/v1/resolutions/check", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["resolved"], json!(["a"]));
    assert_eq!(response.body["open"], json!(["b"]));

    let response = fixture.get("/api/v1/resolutions/summary").await;
    assert_eq!(
        response.body["counts"]["The Police Department issued a summons."],
        1
    );

    let health = fixture.get("/api/v1/health").await;
    assert_eq!(health.body["events"], 2);
}

#[tokio::test]
async fn test_submission_failure_is_reported_in_status() {
    let fixture = TestFixture::new().await;
    let event = fixtures::event_in_zones("a", BASE + 100.0, BASE + 110.0, &["driveway"]);
    fixture.stage_reviewed(vec![event]).await;

    let response = fixture.post("/api/v1/submission", json!({ "dry_run": true })).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let status = wait_for_batch(&fixture).await;
    assert!(status["last_error"]
        .as_str()
        .unwrap()
        .contains("driveway"));
    assert!(fixture.portal.prepared_drafts().await.is_empty());
}

#[tokio::test]
async fn test_cancel_without_batch() {
    let fixture = TestFixture::new().await;
    let response = fixture.post("/api/v1/submission/cancel", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["canceled_batch_id"].is_u64());

    let status = fixture.get("/api/v1/submission").await;
    assert_eq!(status.body["phase"]["state"], "idle");
}
