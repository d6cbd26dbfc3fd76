//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock capabilities injected, enabling end-to-end testing of the API
//! without an NVR, complaint portal or status API.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use nvr_report_core::{
    load_config_from_str,
    testing::{MockComplaintPortal, MockEventSource, MockObjectStorage, MockStatusApi},
    ArtifactLayout, Config,
};
use nvr_report_server::context::{Capabilities, Services};
use nvr_report_server::state::AppState;

/// Re-export fixtures for test convenience
pub use nvr_report_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_review() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/events/a/reviews", json!({
///         "total_reviews": 1
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub services: Arc<Services>,
    pub layout: ArtifactLayout,
    /// Mock NVR - configure events and clip sizes
    pub source: Arc<MockEventSource>,
    /// Mock complaint portal - script failures, inspect drafts
    pub portal: Arc<MockComplaintPortal>,
    pub object_storage: Arc<MockObjectStorage>,
    pub status_api: Arc<MockStatusApi>,
    /// Temporary directory holding every artifact
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    /// Raw body, for non-JSON responses
    pub text: String,
    pub bytes: Vec<u8>,
}

/// Config rooted in `root` with millisecond timings.
pub fn test_config(root: &std::path::Path) -> Config {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 8080

[storage]
events_dir = "{events}"
staging_dir = "{staging}"

[source]
url = "http://nvr.test"

[ingestion]
download_retry_delay_ms = 1
download_pacing_ms = 0

[overlap]
delete_pacing_ms = 0

[submission]
max_attempts = 3
base_delay_ms = 1
backoff_unit_ms = 1
max_delay_ms = 10
poll_slice_ms = 1

[[submission.profiles]]
zone_names = ["sidewalk"]
address = "100 Main Street"
problem_description = "Cyclist riding on the sidewalk"

[portal]
url = "http://portal.test"
api_key = "portal-secret"

[object_storage]
endpoint = "http://storage.test"
public_base_url = "https://clips.test"
token = "storage-secret"

[resolution]
url = "http://status.test"
api_key = "status-secret"
rate_limit_wait_secs = 0
"#,
        events = root.join("events").display(),
        staging = root.join("staging").display(),
    );
    load_config_from_str(&toml).expect("Failed to parse test config")
}

impl TestFixture {
    /// Create a new test fixture with default mocks and a seeded watermark.
    pub async fn new() -> Self {
        let fixture = Self::unseeded().await;
        fixture
            .services
            .submission
            .watermark()
            .seed(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap())
            .await
            .expect("Failed to seed watermark");
        fixture
    }

    /// Create a fixture without a submission watermark.
    pub async fn unseeded() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(temp_dir.path());

        // Create mocks
        let source = Arc::new(MockEventSource::new());
        let portal = Arc::new(MockComplaintPortal::new());
        let object_storage = Arc::new(MockObjectStorage::new());
        let status_api = Arc::new(MockStatusApi::new());

        let capabilities = Capabilities {
            source: source.clone(),
            portal: portal.clone(),
            object_storage: Some(object_storage.clone()),
            status_api: status_api.clone(),
        };
        let services = Arc::new(
            Services::build(&config, capabilities)
                .await
                .expect("Failed to build services"),
        );

        let state = Arc::new(AppState::new(config, Arc::clone(&services)));
        let router = nvr_report_server::api::create_router(state);

        Self {
            router,
            layout: services.layout.clone(),
            services,
            source,
            portal,
            object_storage,
            status_api,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            text,
            bytes: body_bytes.to_vec(),
        }
    }

    /// Publish events and stage a clip plus a full quorum for each.
    pub async fn stage_reviewed(&self, events: Vec<nvr_report_core::Event>) {
        for event in &events {
            fixtures::write_staged_clip(&self.layout, &event.id, 2 * 1024 * 1024).await;
            fixtures::write_reviews(&self.layout, &event.id, 2).await;
        }
        self.source.set_events(events).await;
    }
}
