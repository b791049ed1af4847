use format_core::config::{
    ENV_BACKEND, ENV_INSTANCE_MODE, ENV_NODE_PROJECT_DIR, ENV_PORT_FILE_DIR,
};
use format_core::{SERVER_BASE_URL, SHUTDOWN_ACKNOWLEDGEMENT, SHUTDOWN_PATH};

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::process::{Child, Command as TokioCommand};
use tokio::time::{sleep as TokioSleep, timeout};

// ============================================================================
// End-to-end tests against the real binary
// Only endpoints that need no installed formatter are exercised
// ============================================================================

const SERVER_BINARY: &str = env!("CARGO_BIN_EXE_format-server");

fn spawn_server(dir: &Path, mode: &str, args: &[&str]) -> Child {
    TokioCommand::new(SERVER_BINARY)
        .args(args)
        .current_dir(dir)
        .env_remove(ENV_BACKEND)
        .env_remove(ENV_PORT_FILE_DIR)
        .env_remove(ENV_NODE_PROJECT_DIR)
        .env(ENV_INSTANCE_MODE, mode)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("server binary should spawn")
}

/// Poll for the port file the way a parent process would.
async fn wait_for_port(port_file: &Path) -> u16 {
    for _ in 0..200 {
        if let Ok(contents) = tokio::fs::read_to_string(port_file).await {
            return contents.parse().expect("port file holds a decimal port");
        }
        TokioSleep(Duration::from_millis(50)).await;
    }
    panic!("{} never appeared", port_file.display());
}

async fn shutdown(port: u16) {
    let response = reqwest::Client::new()
        .post(format!("{SERVER_BASE_URL}:{port}{SHUTDOWN_PATH}"))
        .send()
        .await
        .expect("shutdown reaches the server");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), SHUTDOWN_ACKNOWLEDGEMENT);
}

/// **VALUE**: Two instances in one directory publish `server-a.port` and
/// `server-b.port` with different ports, and both stop on `/shutdown`.
///
/// **WHY THIS MATTERS**: This is how a build running formatters in parallel
/// discovers each of its servers.
///
/// **BUG THIS CATCHES**: Would catch instances sharing a port file, or the
/// process staying alive after acknowledging shutdown.
#[tokio::test]
async fn given_two_instances_when_started_then_separate_port_files_and_clean_exit() {
    // GIVEN: One working directory
    let dir = TempDir::new().expect("tempdir");

    // WHEN: Starting instances "a" and "b"
    let mut a = spawn_server(dir.path(), "multi", &["--node-server-instance-id=a"]);
    let mut b = spawn_server(dir.path(), "multi", &["--node-server-instance-id=b"]);
    let port_a = wait_for_port(&dir.path().join("server-a.port")).await;
    let port_b = wait_for_port(&dir.path().join("server-b.port")).await;

    // THEN: Distinct ports, separate log files
    assert_ne!(port_a, port_b);
    assert!(dir.path().join("format-server-a.log").exists());
    assert!(dir.path().join("format-server-b.log").exists());

    // AND: Both exit successfully after /shutdown
    shutdown(port_a).await;
    shutdown(port_b).await;
    let status_a = timeout(Duration::from_secs(10), a.wait())
        .await
        .expect("a should exit")
        .expect("a status");
    let status_b = timeout(Duration::from_secs(10), b.wait())
        .await
        .expect("b should exit")
        .expect("b status");
    assert!(status_a.success());
    assert!(status_b.success());
}

#[tokio::test]
async fn given_multi_mode_without_id_when_started_then_exits_with_failure() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");

    // WHEN
    let mut child = spawn_server(dir.path(), "multi", &[]);
    let status = timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("process should exit")
        .expect("status");

    // THEN
    assert!(!status.success());
    assert!(!dir.path().join("server.port").exists());
}

#[tokio::test]
async fn given_single_mode_when_resolving_style_config_then_served_by_binary() {
    // GIVEN: Single mode with a config file in the working directory
    let dir = TempDir::new().expect("tempdir");
    let config_path = dir.path().join(".prettierrc.yaml");
    std::fs::write(&config_path, "semi: false\ntabWidth: 2\n").expect("write config");
    let mut child = spawn_server(dir.path(), "single", &[]);
    let port = wait_for_port(&dir.path().join("server.port")).await;

    // WHEN
    let response = reqwest::Client::new()
        .post(format!("{SERVER_BASE_URL}:{port}/prettier/config-options"))
        .json(&json!({
            "prettier_config_path": config_path,
            "prettier_config_options": { "semi": true }
        }))
        .send()
        .await
        .expect("request reaches the server");

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(body, json!({ "semi": true, "tabWidth": 2 }));

    shutdown(port).await;
    let status = timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("process should exit")
        .expect("status");
    assert!(status.success());
}
