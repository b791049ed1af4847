use crate::engine::command::{locate_executable, run_with_stdin};
use crate::engine::{Options, StyleEngine};
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

pub const PRETTIER_BINARY: &str = "prettier";

/// Not a prettier config key; selects the parser through `--stdin-filepath`.
pub(crate) const FILEPATH_OPTION: &str = "filepath";
pub(crate) const PARSER_OPTION: &str = "parser";

const CONFIG_FLAG: &str = "--config";
const NO_EDITORCONFIG_FLAG: &str = "--no-editorconfig";
const STDIN_FILEPATH_FLAG: &str = "--stdin-filepath";
const PARSER_FLAG: &str = "--parser";

/// Style engine backed by the `prettier` command line.
///
/// The caller's options are written to a temporary JSON config so that every
/// option prettier accepts in a config file is supported without translating
/// it into flags.
#[derive(Debug, Clone)]
pub struct PrettierCli {
    node_project_dir: PathBuf,
}

impl PrettierCli {
    pub fn new(node_project_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_project_dir: node_project_dir.into(),
        }
    }
}

/// Options as they go into the generated config file.
pub(crate) fn config_file_options(options: &Options) -> Options {
    let mut config = options.clone();
    config.remove(FILEPATH_OPTION);
    config
}

pub(crate) fn build_prettier_command(
    program: &Path,
    config_file: &Path,
    options: &Options,
    working_dir: &Path,
) -> TokioCommand {
    let mut cmd = TokioCommand::new(program);
    cmd.current_dir(working_dir)
        .arg(CONFIG_FLAG)
        .arg(config_file)
        .arg(NO_EDITORCONFIG_FLAG);

    if let Some(Value::String(filepath)) = options.get(FILEPATH_OPTION) {
        cmd.arg(STDIN_FILEPATH_FLAG).arg(filepath);
    }
    if let Some(Value::String(parser)) = options.get(PARSER_OPTION) {
        cmd.arg(PARSER_FLAG).arg(parser);
    }
    cmd
}

#[track_caller]
fn write_config_file(options: &Options) -> Result<NamedTempFile, EngineError> {
    let json = serde_json::to_vec(&config_file_options(options)).map_err(|e| EngineError::Failed {
        message: format!("Failed to serialize prettier options: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let mut file = tempfile::Builder::new()
        .prefix("prettier-options-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| EngineError::Spawn {
            message: format!("Failed to create prettier options file: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

    file.write_all(&json).map_err(|e| EngineError::Spawn {
        message: format!("Failed to write prettier options file: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    Ok(file)
}

#[async_trait]
impl StyleEngine for PrettierCli {
    async fn format(&self, text: &str, options: &Options) -> Result<String, EngineError> {
        let program = locate_executable(PRETTIER_BINARY, &self.node_project_dir)?;
        // Removed on drop, so it must outlive the process.
        let config_file = write_config_file(options)?;

        debug!(
            "Formatting {} bytes with prettier (config {})",
            text.len(),
            config_file.path().display()
        );

        let command =
            build_prettier_command(&program, config_file.path(), options, &self.node_project_dir);
        let output = run_with_stdin(command, text).await?;

        if !output.success() {
            return Err(EngineError::Failed {
                message: output.failure_message(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(output.stdout)
    }
}
