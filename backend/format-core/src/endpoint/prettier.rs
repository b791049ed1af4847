use crate::endpoint::{EndpointError, payload, required};
use crate::engine::{Options, StyleEngine};
use crate::style_config;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use log::debug;
use serde::Deserialize;

pub const FORMAT_PATH: &str = "/prettier/format";
pub const CONFIG_OPTIONS_PATH: &str = "/prettier/config-options";

#[derive(Debug, Default, Deserialize)]
pub struct FormatRequest {
    pub file_content: Option<String>,
    /// Absent means the engine's defaults.
    pub config_options: Option<Options>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigOptionsRequest {
    pub prettier_config_path: Option<PathBuf>,
    pub prettier_config_options: Option<Options>,
}

pub fn router(engine: Arc<dyn StyleEngine>) -> Router {
    Router::new()
        .route(FORMAT_PATH, post(format))
        .route(CONFIG_OPTIONS_PATH, post(config_options))
        .with_state(engine)
}

async fn format(
    State(engine): State<Arc<dyn StyleEngine>>,
    request: Result<Json<FormatRequest>, JsonRejection>,
) -> Result<String, EndpointError> {
    let request = payload(request)?;
    let text = required(request.file_content, "file_content")?;
    let options = request.config_options.unwrap_or_default();

    debug!("Style format request: {} bytes, {} options", text.len(), options.len());

    Ok(engine.format(&text, &options).await?)
}

async fn config_options(
    request: Result<Json<ConfigOptionsRequest>, JsonRejection>,
) -> Result<Json<Options>, EndpointError> {
    let request = payload(request)?;

    debug!(
        "Style config request: path {:?}, {} overrides",
        request.prettier_config_path,
        request.prettier_config_options.as_ref().map_or(0, |o| o.len())
    );

    let resolved = style_config::resolve(
        request.prettier_config_path.as_deref(),
        request.prettier_config_options,
    )
    .await?;

    Ok(Json(resolved))
}
