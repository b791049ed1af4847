use crate::endpoint::{EndpointError, payload, required};
use crate::engine::{LintEngine, LintRequest, LintResult, Options};

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use log::debug;
use serde::Deserialize;

pub const FORMAT_PATH: &str = "/eslint/format";

pub const NO_CONFIG_MESSAGE: &str = "No config provided";
const FATAL_FALLBACK_MESSAGE: &str = "Fatal error while linting";

#[derive(Debug, Default, Deserialize)]
pub struct FormatRequest {
    pub file_content: Option<String>,
    pub file_path: Option<PathBuf>,
    pub eslint_override_config: Option<Options>,
    pub eslint_override_config_file: Option<PathBuf>,
    pub node_modules_dir: Option<PathBuf>,
    pub ts_config_root_dir: Option<PathBuf>,
}

impl FormatRequest {
    /// Validate the payload. The config check comes first: without one there
    /// is nothing to lint against whatever the rest of the body says.
    #[track_caller]
    pub fn into_lint_request(self) -> Result<LintRequest, EndpointError> {
        if self.eslint_override_config.is_none() && self.eslint_override_config_file.is_none() {
            return Err(EndpointError::invalid_request(NO_CONFIG_MESSAGE));
        }

        let file_path = required(self.file_path, "file_path")?;
        let text = required(self.file_content, "file_content")?;

        Ok(LintRequest {
            text,
            file_path,
            override_config: self.eslint_override_config,
            override_config_file: self.eslint_override_config_file,
            node_modules_dir: self.node_modules_dir,
            ts_config_root_dir: self.ts_config_root_dir,
        })
    }
}

pub fn router(engine: Arc<dyn LintEngine>) -> Router {
    Router::new()
        .route(FORMAT_PATH, post(format))
        .with_state(engine)
}

/// The fixed text for a single-file report, or the input when nothing changed.
#[track_caller]
pub(crate) fn fixed_text(results: Vec<LintResult>, input: &str) -> Result<String, EndpointError> {
    let count = results.len();
    let [result]: [LintResult; 1] = results.try_into().map_err(|_| {
        EndpointError::engine_failed(format!("Unexpected number of results: {count}"))
    })?;

    if result.is_fatal() {
        let message = result
            .messages
            .iter()
            .find(|m| m.fatal == Some(true))
            .map_or_else(|| FATAL_FALLBACK_MESSAGE.to_string(), |m| m.message.clone());

        return Err(EndpointError::EngineFailed {
            message,
            location: ErrorLocation::from(Location::caller()),
            diagnostics: Some(result.messages),
        });
    }

    Ok(result.output.unwrap_or_else(|| input.to_string()))
}

async fn format(
    State(engine): State<Arc<dyn LintEngine>>,
    request: Result<Json<FormatRequest>, JsonRejection>,
) -> Result<String, EndpointError> {
    let request = payload(request)?.into_lint_request()?;

    debug!(
        "Lint format request for {}: {} bytes",
        request.file_path.display(),
        request.text.len()
    );

    let results = engine.lint_fix(&request).await?;
    fixed_text(results, &request.text)
}
