// Unit tests for error module

use crate::error::FormatServerError;

use format_core::error::identity::IdentityError;

use common::ErrorLocation;

use std::panic::Location;

#[test]
fn given_identity_error_when_converted_then_identity_variant_keeps_message() {
    // GIVEN
    let identity = IdentityError::Missing {
        message: "No instance id provided".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN
    let error = FormatServerError::from(identity);

    // THEN
    match &error {
        FormatServerError::Identity { message, .. } => {
            assert!(message.contains("No instance id provided"))
        }
        other => panic!("expected Identity variant, got {other:?}"),
    }
    assert!(error.to_string().starts_with("Identity Error: "));
}

/// **VALUE**: The location in the message is where the conversion happened.
#[test]
fn given_error_when_displayed_then_ends_with_source_location() {
    let error = FormatServerError::FormatServer {
        message: "Failed to create log file".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    let text = error.to_string();

    assert!(text.contains("src/tests/error.rs:"), "got {text}");
    assert!(text.ends_with(']'));
}
