use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Write a minimal valid config rooted in `root` and return its path
fn write_config(root: &Path, port: u16) -> std::path::PathBuf {
    let content = format!(
        r#"
[server]
host = "127.0.0.1"
port = {port}

[storage]
events_dir = "{events}"
staging_dir = "{staging}"

[source]
url = "http://127.0.0.1:9"

[portal]
url = "http://127.0.0.1:9"
api_key = "portal-secret"

[resolution]
url = "http://127.0.0.1:9"
api_key = "status-secret"
"#,
        port = port,
        events = root.join("events").display(),
        staging = root.join("staging").display(),
    );
    let path = root.join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn command(config_path: &Path) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_nvr-report"));
    command
        .env("NVR_REPORT_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true);
    command
}

/// Run a subcommand to completion
async fn run(config_path: &Path, args: &[&str]) -> std::process::Output {
    timeout(Duration::from_secs(10), command(config_path).args(args).output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_serve_health_and_config() {
    let temp = TempDir::new().unwrap();
    let port = get_available_port();
    let config_path = write_config(temp.path(), port);

    let mut server = command(&config_path).arg("serve").spawn().unwrap();
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["portal"]["credential_configured"], true);

    // Serving seeds the watermark.
    assert!(temp.path().join("events/lastSubmissionRun.json").exists());

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_seed_last_run_time_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), 8080);
    let watermark = temp.path().join("events/lastSubmissionRun.json");

    let output = run(&config_path, &["seed-last-run-time"]).await;
    assert!(output.status.success());
    let first = std::fs::read_to_string(&watermark).unwrap();
    assert!(first.contains("lastRunTime"));

    let output = run(&config_path, &["seed-last-run-time"]).await;
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(&watermark).unwrap(), first);
}

#[tokio::test]
async fn test_build_db_indexes_saved_events() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), 8080);

    let event_dir = temp.path().join("events/a");
    std::fs::create_dir_all(&event_dir).unwrap();
    std::fs::write(
        event_dir.join("event.json"),
        r#"{"id": "a", "start_time": 1700000100.0, "end_time": 1700000110.0, "zones": ["sidewalk"], "data": {}}"#,
    )
    .unwrap();

    let output = run(&config_path, &["build-db"]).await;
    assert!(output.status.success());

    let database = std::fs::read_to_string(temp.path().join("events/database.json")).unwrap();
    assert!(database.contains("\"a\""));
}

#[tokio::test]
async fn test_list_requests_on_empty_store() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), 8080);

    let output = run(&config_path, &["list-requests"]).await;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let output = run(Path::new("/nonexistent/config.toml"), &["list-requests"]).await;
    assert!(!output.status.success());
}

#[tokio::test]
async fn test_identical_directories_exit_with_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    let dir = temp.path().join("events");
    std::fs::write(
        &path,
        format!(
            r#"
[storage]
events_dir = "{dir}"
staging_dir = "{dir}"

[source]
url = "http://127.0.0.1:9"

[portal]
url = "http://127.0.0.1:9"

[resolution]
url = "http://127.0.0.1:9"
"#,
            dir = dir.display()
        ),
    )
    .unwrap();

    let output = run(&path, &["list-requests"]).await;
    assert!(!output.status.success());
}
