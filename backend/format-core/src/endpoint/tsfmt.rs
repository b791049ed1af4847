use crate::endpoint::{EndpointError, payload, required};
use crate::engine::{TsFmtEngine, TsFmtOptions};

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

pub const FORMAT_PATH: &str = "/tsfmt/format";

/// The text never touches the disk; this name only tells the formatter what
/// kind of source it is looking at.
pub const VIRTUAL_FILE_NAME: &str = "format-input.ts";

#[derive(Debug, Default, Deserialize)]
pub struct FormatRequest {
    pub file_content: Option<String>,
    pub config_options: Option<Value>,
}

pub fn router(engine: Arc<dyn TsFmtEngine>) -> Router {
    Router::new()
        .route(FORMAT_PATH, post(format))
        .with_state(engine)
}

#[track_caller]
pub(crate) fn parse_options(value: Option<Value>) -> Result<TsFmtOptions, EndpointError> {
    match value {
        None | Some(Value::Null) => Ok(TsFmtOptions::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| EndpointError::invalid_request(format!("Invalid tsfmt options: {e}"))),
    }
}

async fn format(
    State(engine): State<Arc<dyn TsFmtEngine>>,
    request: Result<Json<FormatRequest>, JsonRejection>,
) -> Result<String, EndpointError> {
    let request = payload(request)?;
    let text = required(request.file_content, "file_content")?;
    let options = parse_options(request.config_options)?;

    debug!("TypeScript format request: {} bytes", text.len());

    let result = engine
        .process_string(VIRTUAL_FILE_NAME, &text, &options)
        .await?;

    if result.error {
        return Err(EndpointError::engine_rejected(result.message));
    }

    Ok(result.dest)
}
