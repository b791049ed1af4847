use crate::engine::command::{locate_executable, run_with_stdin};
use crate::engine::{LintEngine, LintRequest, LintResult, Options};
use crate::error::engine::EngineError;

use common::ErrorLocation;

use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::process::Command as TokioCommand;

pub const ESLINT_BINARY: &str = "eslint";

const EXTENDS_KEY: &str = "extends";
const PARSER_OPTIONS_KEY: &str = "parserOptions";
const TSCONFIG_ROOT_DIR_KEY: &str = "tsconfigRootDir";

/// eslint exits with 1 when unfixable findings remain; the report is still valid.
const EXIT_FINDINGS_REMAIN: i32 = 1;

/// Lint engine backed by the `eslint` command line (eslintrc mode).
#[derive(Debug, Clone)]
pub struct EslintCli {
    node_project_dir: PathBuf,
}

impl EslintCli {
    pub fn new(node_project_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_project_dir: node_project_dir.into(),
        }
    }
}

/// The config eslint is run with, or `None` when the override file can be
/// passed through untouched.
///
/// The inline object wins over the file: the file is prepended to `extends`.
pub(crate) fn generated_config(request: &LintRequest) -> Option<Options> {
    if request.override_config.is_none() && request.ts_config_root_dir.is_none() {
        return None;
    }

    let mut config = request.override_config.clone().unwrap_or_default();

    if let Some(ref file) = request.override_config_file {
        let file = Value::String(file.to_string_lossy().to_string());
        let extends = match config.remove(EXTENDS_KEY) {
            Some(Value::Array(mut existing)) => {
                existing.insert(0, file);
                existing
            }
            Some(existing @ Value::String(_)) => vec![file, existing],
            _ => vec![file],
        };
        config.insert(EXTENDS_KEY.to_string(), Value::Array(extends));
    }

    if let Some(ref root) = request.ts_config_root_dir {
        let parser_options = config
            .entry(PARSER_OPTIONS_KEY.to_string())
            .or_insert_with(|| Value::Object(Options::new()));
        if !parser_options.is_object() {
            *parser_options = Value::Object(Options::new());
        }
        if let Value::Object(parser_options) = parser_options {
            parser_options.insert(
                TSCONFIG_ROOT_DIR_KEY.to_string(),
                Value::String(root.to_string_lossy().to_string()),
            );
        }
    }

    Some(config)
}

pub(crate) fn build_eslint_command(
    program: &Path,
    config_file: &Path,
    request: &LintRequest,
    plugin_dir: &Path,
) -> TokioCommand {
    let mut cmd = TokioCommand::new(program);
    cmd.current_dir(plugin_dir)
        .arg("--stdin")
        .arg("--stdin-filename")
        .arg(&request.file_path)
        .arg("--fix-dry-run")
        .arg("--format")
        .arg("json")
        .arg("--no-eslintrc")
        .arg("--config")
        .arg(config_file)
        .arg("--resolve-plugins-relative-to")
        .arg(plugin_dir);
    cmd
}

#[track_caller]
fn write_config_file(config: &Options) -> Result<NamedTempFile, EngineError> {
    let json = serde_json::to_vec_pretty(config).map_err(|e| EngineError::Failed {
        message: format!("Failed to serialize eslint override config: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let mut file = tempfile::Builder::new()
        .prefix("eslint-override-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| EngineError::Spawn {
            message: format!("Failed to create eslint config file: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

    file.write_all(&json).map_err(|e| EngineError::Spawn {
        message: format!("Failed to write eslint config file: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    Ok(file)
}

#[track_caller]
pub(crate) fn parse_report(stdout: &str) -> Result<Vec<LintResult>, EngineError> {
    serde_json::from_str(stdout.trim()).map_err(|e| EngineError::Output {
        message: format!("Failed to parse eslint report: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[async_trait]
impl LintEngine for EslintCli {
    async fn lint_fix(&self, request: &LintRequest) -> Result<Vec<LintResult>, EngineError> {
        let program = locate_executable(ESLINT_BINARY, &self.node_project_dir)?;
        let plugin_dir = request
            .node_modules_dir
            .as_deref()
            .unwrap_or(&self.node_project_dir);

        // Held until eslint exits; the file is deleted on drop.
        let generated = generated_config(request)
            .map(|config| write_config_file(&config))
            .transpose()?;

        let config_path: &Path = match (&generated, &request.override_config_file) {
            (Some(file), _) => file.path(),
            (None, Some(path)) => path.as_path(),
            (None, None) => {
                return Err(EngineError::Failed {
                    message: "No config provided".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        debug!(
            "Linting {} with eslint (config {})",
            request.file_path.display(),
            config_path.display()
        );

        let command = build_eslint_command(&program, config_path, request, plugin_dir);
        let output = run_with_stdin(command, &request.text).await?;

        if !output.success() && output.code() != Some(EXIT_FINDINGS_REMAIN) {
            return Err(EngineError::Failed {
                message: output.failure_message(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        parse_report(&output.stdout)
    }
}
