use common::ErrorLocation;

use std::io::Error as IoError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ServerError {
    #[error("Bind Error: {message} {location}")]
    Bind {
        message: String,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Serve Error: {message} {location}")]
    Serve {
        message: String,
        location: ErrorLocation,
    },
}
