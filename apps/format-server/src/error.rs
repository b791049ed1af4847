use common::ErrorLocation;

use format_core::error::config::ConfigError;
use format_core::error::identity::IdentityError;
use format_core::error::server::ServerError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the server from starting.
///
/// Core errors are flattened into a message so that the location recorded
/// here is the startup step that failed.
#[derive(Debug, Error)]
pub enum FormatServerError {
    /// Error from this App (logger, working directory)
    #[error("Format Server Error: {message} {location}")]
    FormatServer {
        message: String,
        location: ErrorLocation,
    },

    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Multi-instance mode without a usable instance id
    #[error("Identity Error: {message} {location}")]
    Identity {
        message: String,
        location: ErrorLocation,
    },

    #[error("Server Error: {message} {location}")]
    Server {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for FormatServerError {
    #[track_caller]
    fn from(e: ConfigError) -> Self {
        FormatServerError::Config {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IdentityError> for FormatServerError {
    #[track_caller]
    fn from(e: IdentityError) -> Self {
        FormatServerError::Identity {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ServerError> for FormatServerError {
    #[track_caller]
    fn from(e: ServerError) -> Self {
        FormatServerError::Server {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
