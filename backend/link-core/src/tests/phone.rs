use crate::auth::normalize_phone_number;
use crate::error::AuthError;

#[test]
fn given_formatted_number_when_normalized_then_keeps_plus_and_digits() {
    let phone = normalize_phone_number(" +1 (415) 555-1234 ").expect("valid number");

    assert_eq!(phone.as_str(), "+14155551234");
    assert_eq!(phone.digit_count(), 11);
}

#[test]
fn given_boundary_lengths_when_normalized_then_ten_and_fifteen_digits_pass() {
    assert!(normalize_phone_number("+1234567890").is_ok());
    assert!(normalize_phone_number("+123456789012345").is_ok());
}

/// **VALUE**: Rejects the inputs an operator most often gets wrong.
///
/// **BUG THIS CATCHES**: Accepting a number without a country code, which the
/// remote side would silently misroute.
#[test]
fn given_invalid_numbers_when_normalized_then_validation_error() {
    for raw in ["14155551234", "+123456789", "+1234567890123456", "+", ""] {
        match normalize_phone_number(raw) {
            Err(AuthError::Validation { .. }) => {}
            other => panic!("{raw:?} should fail validation, got {other:?}"),
        }
    }
}

#[test]
fn given_valid_number_when_debug_printed_then_masked() {
    let phone = normalize_phone_number("+14155551234").expect("valid number");

    let printed = format!("{phone:?}");

    assert!(!printed.contains("4155551"));
    assert!(printed.contains("1234"));
}
