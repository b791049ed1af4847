use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum IdentityError {
    #[error("Missing Instance Id Error: {message} {location}")]
    Missing {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Instance Id Error: {message} {location}")]
    Invalid {
        message: String,
        location: ErrorLocation,
    },
}
