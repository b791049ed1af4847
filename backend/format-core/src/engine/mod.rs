//! Formatting engine capabilities and their process-backed adapters.
//!
//! Endpoints only see the traits below. The adapters in [`prettier`],
//! [`eslint`] and [`tsfmt`] run the respective tools as child processes
//! through [`command`]; tests inject in-memory engines instead.

pub mod command;
pub mod eslint;
pub mod prettier;
pub mod tsfmt;

use crate::error::engine::EngineError;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied engine options, passed through as structured JSON.
pub type Options = Map<String, Value>;

/// Style formatter (prettier-like): `format(text, options) -> text`.
#[async_trait]
pub trait StyleEngine: Send + Sync {
    async fn format(&self, text: &str, options: &Options) -> Result<String, EngineError>;
}

/// Lint formatter (eslint-like): lint with fixes applied, one result per input.
#[async_trait]
pub trait LintEngine: Send + Sync {
    async fn lint_fix(&self, request: &LintRequest) -> Result<Vec<LintResult>, EngineError>;
}

/// TypeScript formatter (tsfmt-like).
///
/// An `Err` is an engine exception; a reported problem comes back as
/// `Ok(TsFmtResult { error: true, .. })`.
#[async_trait]
pub trait TsFmtEngine: Send + Sync {
    async fn process_string(
        &self,
        file_name: &str,
        text: &str,
        options: &TsFmtOptions,
    ) -> Result<TsFmtResult, EngineError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LintRequest {
    pub text: String,
    /// Selects the applicable rules; never read from disk.
    pub file_path: PathBuf,
    pub override_config: Option<Options>,
    pub override_config_file: Option<PathBuf>,
    pub node_modules_dir: Option<PathBuf>,
    pub ts_config_root_dir: Option<PathBuf>,
}

/// One entry of the engine's JSON report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub messages: Vec<LintMessage>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub fatal_error_count: u32,
    #[serde(default)]
    pub warning_count: u32,
    /// Present only when fixes changed the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl LintResult {
    /// Fatal errors (parse failures, broken config) as opposed to findings.
    pub fn is_fatal(&self) -> bool {
        self.fatal_error_count > 0 || self.messages.iter().any(|m| m.fatal == Some(true))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMessage {
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub severity: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<bool>,
}

/// Options understood by the TypeScript formatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TsFmtOptions {
    #[serde(default)]
    pub basedir: Option<PathBuf>,
    #[serde(default)]
    pub tsconfig: Option<bool>,
    #[serde(default)]
    pub tsconfig_file: Option<PathBuf>,
    #[serde(default)]
    pub tslint: Option<bool>,
    #[serde(default)]
    pub tslint_file: Option<PathBuf>,
    #[serde(default)]
    pub editorconfig: Option<bool>,
    #[serde(default)]
    pub vscode: Option<bool>,
    #[serde(default)]
    pub vscode_file: Option<PathBuf>,
    #[serde(default)]
    pub tsfmt: Option<bool>,
    #[serde(default)]
    pub tsfmt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsFmtResult {
    pub error: bool,
    pub message: String,
    pub dest: String,
}

impl TsFmtResult {
    pub fn formatted(dest: impl Into<String>) -> Self {
        Self {
            error: false,
            message: String::new(),
            dest: dest.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            dest: String::new(),
        }
    }
}
