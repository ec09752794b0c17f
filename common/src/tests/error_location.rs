use crate::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Every error in the workspace prints its origin through this type.
///
/// **BUG THIS CATCHES**: Would catch if the file or line capture breaks, which
/// would strip the debugging value out of every status line and log entry.
#[test]
#[track_caller]
fn given_location_caller_when_error_location_created_then_captures_this_file() {
    // GIVEN/WHEN: Capturing the current caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: File, line and column are populated
    assert!(location.file.contains("error_location.rs"));
    assert!(location.line > 0);
    assert!(location.column > 0);
}

#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: A location
    let location = ErrorLocation::caller();

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: "[file:line:column]"
    assert!(formatted.starts_with('[') && formatted.ends_with(']'));
    assert_eq!(formatted.matches(':').count(), 2);
    assert!(formatted.contains(&location.line.to_string()));
}

/// **VALUE**: `caller()` must honour `#[track_caller]` so helper constructors
/// report the site that used them.
#[test]
fn given_track_caller_helper_when_called_twice_then_lines_differ() {
    // GIVEN: A helper that forwards its caller
    #[track_caller]
    fn capture() -> ErrorLocation {
        ErrorLocation::caller()
    }

    // WHEN: Calling from two consecutive lines
    let first = capture();
    let second = capture();

    // THEN: Same file, consecutive lines
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
}
