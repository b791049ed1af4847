//! Formatter endpoints.
//!
//! Each backend module exposes a `router` over its engine capability. Handlers
//! validate the payload before the engine is touched and turn every failure
//! into a response here, at the handler boundary:
//!
//! | Failure | Status | Body |
//! |---|---|---|
//! | missing or malformed input | 400 | text |
//! | engine-reported error flag | 400 | text |
//! | engine exception | 500 | text |
//! | fatal lint result | 500 | JSON `{message, messages}` |
//! | body over the limit | 413 | text |

pub mod eslint;
pub mod prettier;
pub mod tsfmt;

pub use crate::error::endpoint::EndpointError;

use crate::error::engine::EngineError;
use crate::error::resolve::ResolveError;

use common::ErrorLocation;

use std::panic::Location;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde_json::json;

impl EndpointError {
    #[track_caller]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        EndpointError::InvalidRequest {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn engine_rejected(message: impl Into<String>) -> Self {
        EndpointError::EngineRejected {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn engine_failed(message: impl Into<String>) -> Self {
        EndpointError::EngineFailed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
            diagnostics: None,
        }
    }
}

impl From<EngineError> for EndpointError {
    #[track_caller]
    fn from(e: EngineError) -> Self {
        EndpointError::engine_failed(e.message())
    }
}

impl From<ResolveError> for EndpointError {
    #[track_caller]
    fn from(e: ResolveError) -> Self {
        EndpointError::engine_failed(format!("Error while resolving config: {}", e.reason()))
    }
}

impl From<JsonRejection> for EndpointError {
    #[track_caller]
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return EndpointError::PayloadTooLarge {
                message,
                location: ErrorLocation::from(Location::caller()),
            };
        }
        EndpointError::invalid_request(message)
    }
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        match self {
            EndpointError::EngineFailed {
                message,
                diagnostics: Some(messages),
                ..
            } => (status, Json(json!({ "message": message, "messages": messages }))).into_response(),
            other => (status, other.message().to_string()).into_response(),
        }
    }
}

/// Unwrap an extracted JSON body, mapping the rejection to a response.
///
/// Handlers take `Result<Json<T>, JsonRejection>` so that a malformed body is
/// answered through [`EndpointError`] like every other failure.
#[track_caller]
pub(crate) fn payload<T: DeserializeOwned>(
    extracted: Result<Json<T>, JsonRejection>,
) -> Result<T, EndpointError> {
    match extracted {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => Err(EndpointError::from(rejection)),
    }
}

#[track_caller]
pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, EndpointError> {
    value.ok_or_else(|| EndpointError::invalid_request(format!("Missing required field: {field}")))
}
