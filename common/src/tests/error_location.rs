use crate::ErrorLocation;

use std::panic::Location;

#[track_caller]
fn capture() -> ErrorLocation {
    ErrorLocation::from(Location::caller())
}

/// **VALUE**: Verifies that a `#[track_caller]` helper reports its call site.
///
/// **BUG THIS CATCHES**: Would catch if the location were taken inside the
/// helper, which would make every error point at the same constructor line.
#[test]
fn given_track_caller_helper_when_location_captured_then_points_at_call_site() {
    // GIVEN / WHEN: Capturing through a tracked helper
    let expected_line = line!() + 1;
    let location = capture();

    // THEN: File and line belong to this test
    assert!(location.file.ends_with("error_location.rs"));
    assert_eq!(location.line, expected_line);
    assert!(location.column > 0);
}

/// **VALUE**: Error messages across the workspace end in `[file:line:column]`.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: A fixed location
    let location = ErrorLocation {
        file: "src/session/publish.rs",
        line: 42,
        column: 7,
    };

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: Bracketed file:line:column
    assert_eq!(formatted, "[src/session/publish.rs:42:7]");
}
