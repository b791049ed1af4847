use crate::engine::command::{CommandOutput, locate_executable, run_with_stdin};
use crate::engine::{Options, TsFmtEngine, TsFmtOptions, TsFmtResult};
use crate::error::engine::EngineError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command as TokioCommand;

pub const NODE_BINARY: &str = "node";
pub const TSFMT_MODULE: &str = "typescript-formatter";

const NODE_PATH_ENV: &str = "NODE_PATH";

/// Reads `{ fileName, text, options }` from stdin, hands it to
/// `processString` and prints `{ error, message, dest }`. A throw or a
/// rejected promise goes to stderr with a non-zero exit.
const RUNNER_SCRIPT: &str = r#"
const chunks = [];
process.stdin.on('data', (chunk) => chunks.push(chunk));
process.stdin.on('end', () => {
  Promise.resolve()
    .then(() => {
      const request = JSON.parse(Buffer.concat(chunks).toString('utf8'));
      const tsfmt = require(process.argv[1]);
      return tsfmt.processString(request.fileName, request.text, request.options);
    })
    .then((result) => {
      process.stdout.write(JSON.stringify({
        error: Boolean(result.error),
        message: result.message || '',
        dest: result.dest || '',
      }));
    })
    .catch((err) => {
      process.stderr.write(String((err && err.stack) || err));
      process.exitCode = 1;
    });
});
"#;

/// TypeScript formatter backed by the `typescript-formatter` module,
/// driven through `node` with a fixed runner script.
///
/// `{ error: true, .. }` printed by the module is a reported problem with the
/// input and comes back as `Ok`. A crash, a missing module or anything that
/// is not a result object is an [`EngineError`].
#[derive(Debug, Clone)]
pub struct TsFmtCli {
    node_project_dir: PathBuf,
}

impl TsFmtCli {
    pub fn new(node_project_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_project_dir: node_project_dir.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunnerRequest<'a> {
    pub file_name: &'a str,
    pub text: &'a str,
    pub options: Options,
}

/// Options as `processString` expects them: never touch the file system,
/// `baseDir` always set, unset settings left to the module's defaults.
pub(crate) fn engine_options(options: &TsFmtOptions, default_dir: &Path) -> Options {
    let mut engine = match serde_json::to_value(options) {
        Ok(Value::Object(map)) => map,
        _ => Options::new(),
    };
    engine.retain(|_, value| !value.is_null());
    engine.remove("basedir");

    let base_dir = options.basedir.as_deref().unwrap_or(default_dir);
    engine.insert(
        "baseDir".to_string(),
        Value::String(base_dir.to_string_lossy().to_string()),
    );
    engine.insert("replace".to_string(), Value::Bool(false));
    engine.insert("verify".to_string(), Value::Bool(false));
    engine
}

pub(crate) fn build_runner_command(program: &Path, node_project_dir: &Path) -> TokioCommand {
    let mut cmd = TokioCommand::new(program);
    cmd.current_dir(node_project_dir)
        .env(NODE_PATH_ENV, node_project_dir.join("node_modules"))
        .arg("-e")
        .arg(RUNNER_SCRIPT)
        .arg(TSFMT_MODULE);
    cmd
}

#[track_caller]
pub(crate) fn parse_runner_output(output: CommandOutput) -> Result<TsFmtResult, EngineError> {
    let location = ErrorLocation::from(Location::caller());

    if !output.success() {
        return Err(EngineError::Failed {
            message: output.failure_message(),
            location,
        });
    }

    serde_json::from_str(output.stdout.trim()).map_err(|e| EngineError::Failed {
        message: format!("{TSFMT_MODULE} returned no result ({e}): {}", output.failure_message()),
        location,
    })
}

#[async_trait]
impl TsFmtEngine for TsFmtCli {
    async fn process_string(
        &self,
        file_name: &str,
        text: &str,
        options: &TsFmtOptions,
    ) -> Result<TsFmtResult, EngineError> {
        let program = locate_executable(NODE_BINARY, &self.node_project_dir)?;

        debug!("Formatting {} bytes as {file_name} with {TSFMT_MODULE}", text.len());

        let request = RunnerRequest {
            file_name,
            text,
            options: engine_options(options, &self.node_project_dir),
        };
        let input = serde_json::to_string(&request).map_err(|e| EngineError::Output {
            message: format!("Failed to encode {TSFMT_MODULE} request: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let command = build_runner_command(&program, &self.node_project_dir);
        let output = run_with_stdin(command, &input).await?;

        parse_runner_output(output)
    }
}
