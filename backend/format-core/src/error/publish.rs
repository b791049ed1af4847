use common::ErrorLocation;

use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PublishError {
    #[error("Port File Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("Port File Rename Error: {from} -> {to}: {source} {location}")]
    Rename {
        location: ErrorLocation,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: IoError,
    },
}
