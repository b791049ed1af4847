use common::ErrorLocation;

use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ResolveError {
    #[error("Style Config Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("Style Config Parse Error: {path}: {reason} {location}")]
    Parse {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },

    #[error("Style Config Unsupported Error: {path}: {reason} {location}")]
    Unsupported {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },
}

impl ResolveError {
    /// Path and reason, without kind prefix or location.
    pub fn reason(&self) -> String {
        match self {
            ResolveError::Read { path, source, .. } => format!("{}: {source}", path.display()),
            ResolveError::Parse { path, reason, .. }
            | ResolveError::Unsupported { path, reason, .. } => {
                format!("{}: {reason}", path.display())
            }
        }
    }
}
