//! Running engine executables with the file content on stdin.

use crate::error::engine::EngineError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use log::{debug, trace};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;

const NODE_MODULES_DIR: &str = "node_modules";
const BIN_DIR: &str = ".bin";

#[cfg(windows)]
const EXECUTABLE_SUFFIX: &str = ".cmd";
#[cfg(not(windows))]
const EXECUTABLE_SUFFIX: &str = "";

/// Find `name` in `<node_project_dir>/node_modules/.bin`, then on `PATH`.
#[track_caller]
pub fn locate_executable(name: &str, node_project_dir: &Path) -> Result<PathBuf, EngineError> {
    let local = node_project_dir
        .join(NODE_MODULES_DIR)
        .join(BIN_DIR)
        .join(format!("{name}{EXECUTABLE_SUFFIX}"));

    if local.is_file() {
        trace!("Using project-local {name} at {}", local.display());
        return Ok(local);
    }

    which::which(name).map_err(|e| EngineError::Unavailable {
        message: format!(
            "{name} not found in {} or on PATH: {e}",
            local.parent().unwrap_or(node_project_dir).display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Best description of a failed run: stderr, else stdout, else the status.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("process exited with {}", self.status)
    }
}

/// Spawn `command`, feed `input` on stdin and collect both output streams.
///
/// Stdin is written from a separate task so a tool that starts printing
/// before it has read everything cannot deadlock against us.
pub async fn run_with_stdin(
    mut command: TokioCommand,
    input: &str,
) -> Result<CommandOutput, EngineError> {
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = command.as_std().get_program().to_string_lossy().to_string();
    debug!("Running {program}");

    let mut child = command.spawn().map_err(|e| EngineError::Spawn {
        message: format!("Failed to spawn {program}: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    let mut stdin = child.stdin.take().ok_or_else(|| EngineError::Spawn {
        message: format!("{program} has no stdin"),
        location: ErrorLocation::from(Location::caller()),
        source: "stdin not captured".into(),
    })?;

    let bytes = input.as_bytes().to_vec();
    let writer = TokioSpawn(async move {
        let result = stdin.write_all(&bytes).await;
        drop(stdin);
        result
    });

    let output = child.wait_with_output().await.map_err(|e| EngineError::Spawn {
        message: format!("Failed to wait for {program}: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    match writer.await {
        Ok(Ok(())) => {}
        // The tool may exit without reading its input; its exit status says more.
        Ok(Err(e)) => debug!("{program} closed stdin early: {e}"),
        Err(e) => debug!("stdin writer for {program} did not finish: {e}"),
    }

    let stdout = String::from_utf8(output.stdout).map_err(|e| EngineError::Output {
        message: format!("{program} wrote non UTF-8 output: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(CommandOutput {
        status: output.status,
        stdout,
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
