use crate::helpers::{FakeStyleEngine, fast_policy, instance_id, post_json, prettier, start, start_with};

use format_core::server::HttpServer;
use format_core::session::{LifecycleState, ServerSession};
use format_core::session::shutdown::{DrainMode, DrainPolicy};
use format_core::{SHUTDOWN_ACKNOWLEDGEMENT, SHUTDOWN_PATH};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::spawn as TokioSpawn;
use tokio::time::{sleep as TokioSleep, timeout};

// ============================================================================
// Readiness publication, multi-instance naming and graceful shutdown
// ============================================================================

/// **VALUE**: The port file holds exactly the port the server answers on.
///
/// **WHY THIS MATTERS**: The parent process discovers the server only
/// through this file.
///
/// **BUG THIS CATCHES**: Would catch publishing before binding (port 0) or
/// publishing a different port than the one served.
#[tokio::test]
async fn given_started_server_when_reading_port_file_then_holds_bound_port() {
    // GIVEN
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    // WHEN
    let contents =
        std::fs::read_to_string(test.dir.path().join("server.port")).expect("port file exists");

    // THEN
    let port: u16 = contents.parse().expect("decimal port");
    assert_eq!(port, test.server.port());
    assert_ne!(port, 0);
    assert_eq!(test.server.port_file(), Some(test.dir.path().join("server.port").as_path()));
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_ok());
}

/// **VALUE**: Two instances sharing a directory publish separate files.
///
/// **BUG THIS CATCHES**: Would catch instances overwriting a shared
/// `server.port` (or a shared temp file) when started concurrently.
#[tokio::test]
async fn given_two_instances_when_started_in_same_dir_then_distinct_port_files() {
    // GIVEN: One directory, instances "a" and "b"
    let dir = TempDir::new().expect("tempdir");
    let engine = Arc::new(FakeStyleEngine::default());

    // WHEN: Started concurrently
    let (a, b) = tokio::join!(
        HttpServer::new(prettier(&engine), dir.path())
            .instance_id(Some(instance_id("a")))
            .start(),
        HttpServer::new(prettier(&engine), dir.path())
            .instance_id(Some(instance_id("b")))
            .start(),
    );
    let (a, b) = (a.expect("a starts"), b.expect("b starts"));

    // THEN
    let port_a: u16 = std::fs::read_to_string(dir.path().join("server-a.port"))
        .expect("server-a.port")
        .parse()
        .expect("decimal");
    let port_b: u16 = std::fs::read_to_string(dir.path().join("server-b.port"))
        .expect("server-b.port")
        .parse()
        .expect("decimal");
    assert_eq!(port_a, a.port());
    assert_eq!(port_b, b.port());
    assert_ne!(port_a, port_b);
    assert!(!dir.path().join("server.port").exists());
}

/// **VALUE**: A reader polling the port file never sees a partial value.
///
/// **BUG THIS CATCHES**: Would catch writing the final file in place, where a
/// reader can observe an empty or truncated port.
#[tokio::test]
async fn given_polling_reader_when_server_starts_then_only_complete_port_observed() {
    // GIVEN: A reader polling the final path before the server exists
    let dir = TempDir::new().expect("tempdir");
    let port_file = dir.path().join("server.port");
    let reader_path = port_file.clone();
    let reader = TokioSpawn(async move {
        let mut observed = Vec::new();
        for _ in 0..400 {
            if let Ok(contents) = tokio::fs::read_to_string(&reader_path).await {
                observed.push(contents);
                if observed.len() > 5 {
                    break;
                }
            }
            TokioSleep(Duration::from_millis(5)).await;
        }
        observed
    });

    // WHEN
    let engine = Arc::new(FakeStyleEngine::default());
    let server = HttpServer::new(prettier(&engine), dir.path())
        .start()
        .await
        .expect("server starts");

    // THEN
    let observed = reader.await.expect("reader task");
    assert!(!observed.is_empty(), "reader should see the file");
    for contents in observed {
        assert_eq!(contents, server.port().to_string());
    }
}

#[tokio::test]
async fn given_unwritable_port_dir_when_starting_then_server_still_serves() {
    // GIVEN: A port file directory that does not exist
    let dir = TempDir::new().expect("tempdir");
    let engine = Arc::new(FakeStyleEngine::default());

    // WHEN
    let server = HttpServer::new(prettier(&engine), dir.path().join("missing"))
        .start()
        .await
        .expect("publication failure is not fatal");

    // THEN
    assert!(server.port_file().is_none());
    let response = post_json(
        &format!("{}/prettier/format", server.base_url()),
        json!({ "file_content": "a=1", "config_options": {} }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// **VALUE**: `/shutdown` is acknowledged, then the server drains and stops
/// accepting connections.
///
/// **BUG THIS CATCHES**: Would catch the listener closing before the
/// acknowledgement is written, or the process never terminating.
#[tokio::test]
async fn given_running_server_when_shutdown_requested_then_ack_then_terminated() {
    // GIVEN
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;
    let port = test.server.port();
    let session = Arc::clone(test.server.session());

    // WHEN
    let response = reqwest::Client::new()
        .post(test.url(SHUTDOWN_PATH))
        .send()
        .await
        .expect("shutdown reaches the server");

    // THEN: Acknowledged while still draining
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), SHUTDOWN_ACKNOWLEDGEMENT);
    assert_eq!(session.state(), LifecycleState::Draining);

    timeout(Duration::from_secs(5), test.server.wait())
        .await
        .expect("server should terminate");
    assert_eq!(session.state(), LifecycleState::Terminated);
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn given_shutdown_acknowledged_when_requesting_within_ack_delay_then_still_served() {
    // GIVEN: A one second acknowledgement delay
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start_with(prettier(&engine), |server| {
        server.drain_policy(DrainPolicy {
            ack_delay: Duration::from_secs(1),
            ..fast_policy(DrainMode::Force)
        })
    })
    .await;
    post_json(&test.url(SHUTDOWN_PATH), json!({})).await;

    // WHEN
    let response = post_json(
        &test.url("/prettier/format"),
        json!({ "file_content": "a=1", "config_options": {} }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
}

/// **VALUE**: A request in flight when the drain starts still completes.
#[tokio::test]
async fn given_in_flight_request_when_draining_then_request_completes() {
    // GIVEN: An engine taking 300 ms, cooperative drain
    let engine = Arc::new(FakeStyleEngine::slow(Duration::from_millis(300)));
    let test = start_with(prettier(&engine), |server| {
        server.drain_policy(fast_policy(DrainMode::Cooperative))
    })
    .await;
    let format_url = test.url("/prettier/format");
    let in_flight = TokioSpawn(async move {
        post_json(&format_url, json!({ "file_content": "a=1", "config_options": {} })).await
    });
    TokioSleep(Duration::from_millis(50)).await;

    // WHEN
    test.server.coordinator().request_now();

    // THEN
    let response = in_flight.await.expect("request task");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "a = 1;\n");
    timeout(Duration::from_secs(5), test.server.wait())
        .await
        .expect("server should terminate");
}

/// **VALUE**: In force mode a stuck request cannot keep the server alive.
#[tokio::test]
async fn given_stuck_request_when_force_draining_then_terminates_after_grace_period() {
    // GIVEN: An engine that takes far longer than the grace period
    let engine = Arc::new(FakeStyleEngine::slow(Duration::from_secs(30)));
    let terminated = Arc::new(AtomicBool::new(false));
    let terminated_flag = Arc::clone(&terminated);
    let test = start_with(prettier(&engine), move |server| {
        server.on_terminated(Box::new(move |_: &ServerSession| {
            terminated_flag.store(true, Ordering::SeqCst)
        }))
    })
    .await;
    let format_url = test.url("/prettier/format");
    let _stuck = TokioSpawn(async move {
        let _ = reqwest::Client::new()
            .post(format_url)
            .json(&json!({ "file_content": "a=1", "config_options": {} }))
            .send()
            .await;
    });
    TokioSleep(Duration::from_millis(50)).await;

    // WHEN
    test.server.coordinator().request_now();

    // THEN
    timeout(Duration::from_secs(5), test.server.wait())
        .await
        .expect("force drain should not wait for the stuck request");
    assert!(terminated.load(Ordering::SeqCst));
}

#[tokio::test]
async fn given_repeated_shutdown_requests_when_draining_then_all_acknowledged() {
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start_with(prettier(&engine), |server| {
        server.drain_policy(DrainPolicy {
            ack_delay: Duration::from_millis(500),
            ..fast_policy(DrainMode::Force)
        })
    })
    .await;

    for _ in 0..2 {
        let response = post_json(&test.url(SHUTDOWN_PATH), json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    timeout(Duration::from_secs(5), test.server.wait())
        .await
        .expect("server should terminate");
}
