use crate::engine::LintMessage;

use common::ErrorLocation;

use axum::http::StatusCode;
use thiserror::Error as ThisError;

/// Every way a formatter request can fail, one variant per status class.
///
/// The message is what the caller receives as the response body.
#[derive(Debug, ThisError)]
pub enum EndpointError {
    #[error("Invalid Request Error: {message} {location}")]
    InvalidRequest {
        message: String,
        location: ErrorLocation,
    },

    /// The engine refused the input and said why (caller-correctable).
    #[error("Engine Rejected Error: {message} {location}")]
    EngineRejected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Engine Failed Error: {message} {location}")]
    EngineFailed {
        message: String,
        location: ErrorLocation,
        diagnostics: Option<Vec<LintMessage>>,
    },

    #[error("Payload Too Large Error: {message} {location}")]
    PayloadTooLarge {
        message: String,
        location: ErrorLocation,
    },
}

impl EndpointError {
    pub fn status(&self) -> StatusCode {
        match self {
            EndpointError::InvalidRequest { .. } | EndpointError::EngineRejected { .. } => {
                StatusCode::BAD_REQUEST
            }
            EndpointError::EngineFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            EndpointError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            EndpointError::InvalidRequest { message, .. }
            | EndpointError::EngineRejected { message, .. }
            | EndpointError::EngineFailed { message, .. }
            | EndpointError::PayloadTooLarge { message, .. } => message,
        }
    }
}
