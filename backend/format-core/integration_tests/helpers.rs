//! Test helpers for server integration tests.
//!
//! This module provides:
//! - In-memory engines standing in for prettier, eslint and tsfmt
//! - Starting a server whose port file lands in a temporary directory
//! - Small request helpers

use format_core::engine::{
    LintEngine, LintRequest, LintResult, Options, StyleEngine, TsFmtEngine, TsFmtOptions,
    TsFmtResult,
};
use format_core::error::engine::EngineError;
use format_core::server::{Backend, HttpServer, RunningServer};
use format_core::session::InstanceId;
use format_core::session::shutdown::{DrainMode, DrainPolicy};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tokio::time::sleep as TokioSleep;

/// Short delays so that lifecycle tests run quickly.
pub fn fast_policy(mode: DrainMode) -> DrainPolicy {
    DrainPolicy {
        ack_delay: Duration::from_millis(100),
        grace_period: Duration::from_millis(200),
        mode,
    }
}

// ============================================================================
// Fake engines
// ============================================================================

/// Inserts spaces around `=` and terminates the statement with `;` (unless
/// `semi` is false) and a newline. Idempotent on its own output.
#[derive(Debug, Default)]
pub struct FakeStyleEngine {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl FakeStyleEngine {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StyleEngine for FakeStyleEngine {
    async fn format(&self, text: &str, options: &Options) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            TokioSleep(delay).await;
        }

        if text.contains("syntax error") {
            return Err(EngineError::Failed {
                message: "SyntaxError: Unexpected token (1:8)".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let semi = options.get("semi") != Some(&Value::Bool(false));
        let statement = text
            .trim()
            .trim_end_matches(';')
            .split('=')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" = ");
        Ok(format!("{statement}{}\n", if semi { ";" } else { "" }))
    }
}

/// Returns the configured results and records every request.
#[derive(Debug, Default)]
pub struct FakeLintEngine {
    pub results: Mutex<Vec<LintResult>>,
    pub requests: Mutex<Vec<LintRequest>>,
}

impl FakeLintEngine {
    pub fn returning(results: Vec<LintResult>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }
}

#[async_trait]
impl LintEngine for FakeLintEngine {
    async fn lint_fix(&self, request: &LintRequest) -> Result<Vec<LintResult>, EngineError> {
        self.requests.lock().expect("lock").push(request.clone());
        Ok(self.results.lock().expect("lock").clone())
    }
}

pub enum TsFmtBehaviour {
    Return(TsFmtResult),
    Throw(String),
}

pub struct FakeTsFmtEngine {
    pub behaviour: TsFmtBehaviour,
    pub seen: Mutex<Vec<(String, TsFmtOptions)>>,
}

impl FakeTsFmtEngine {
    pub fn new(behaviour: TsFmtBehaviour) -> Self {
        Self {
            behaviour,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TsFmtEngine for FakeTsFmtEngine {
    async fn process_string(
        &self,
        file_name: &str,
        _text: &str,
        options: &TsFmtOptions,
    ) -> Result<TsFmtResult, EngineError> {
        self.seen
            .lock()
            .expect("lock")
            .push((file_name.to_string(), options.clone()));

        match &self.behaviour {
            TsFmtBehaviour::Return(result) => Ok(result.clone()),
            TsFmtBehaviour::Throw(message) => Err(EngineError::Failed {
                message: message.clone(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// A started server plus the directory holding its port file.
pub struct TestServer {
    pub server: RunningServer,
    pub dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.base_url())
    }
}

pub async fn start(backend: Backend) -> TestServer {
    start_with(backend, |server| server).await
}

pub async fn start_with(
    backend: Backend,
    configure: impl FnOnce(HttpServer) -> HttpServer,
) -> TestServer {
    let dir = TempDir::new().expect("tempdir");
    let server = configure(
        HttpServer::new(backend, dir.path()).drain_policy(fast_policy(DrainMode::Force)),
    )
    .start()
    .await
    .expect("server should start");
    TestServer { server, dir }
}

pub fn prettier(engine: &Arc<FakeStyleEngine>) -> Backend {
    Backend::Prettier(Arc::clone(engine) as Arc<dyn StyleEngine>)
}

pub fn eslint(engine: &Arc<FakeLintEngine>) -> Backend {
    Backend::Eslint(Arc::clone(engine) as Arc<dyn LintEngine>)
}

pub fn tsfmt(engine: &Arc<FakeTsFmtEngine>) -> Backend {
    Backend::TsFmt(Arc::clone(engine) as Arc<dyn TsFmtEngine>)
}

/// Writes an executable `node_modules/.bin/<name>` shell script that drains
/// stdin and then runs `body`.
#[cfg(unix)]
pub fn fake_executable(node_project_dir: &std::path::Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let bin_dir = node_project_dir.join("node_modules").join(".bin");
    std::fs::create_dir_all(&bin_dir).expect("create bin dir");
    let path = bin_dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{body}\n")).expect("write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod stub");
}

pub fn instance_id(value: &str) -> InstanceId {
    InstanceId::parse(value).expect("valid test id")
}

pub async fn post_json(url: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("request should reach the server")
}
