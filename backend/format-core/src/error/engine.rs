use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

/// Failures raised by (or while driving) a formatting engine.
///
/// Every variant ends up as a 5xx response; the message is passed through to
/// the caller unchanged.
#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error("Engine Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Engine Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Engine Failed Error: {message} {location}")]
    Failed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Engine Output Error: {message} {location}")]
    Output {
        message: String,
        location: ErrorLocation,
    },
}

impl EngineError {
    /// The engine's own message, without kind prefix or location.
    pub fn message(&self) -> &str {
        match self {
            EngineError::Unavailable { message, .. }
            | EngineError::Spawn { message, .. }
            | EngineError::Failed { message, .. }
            | EngineError::Output { message, .. } => message,
        }
    }
}
