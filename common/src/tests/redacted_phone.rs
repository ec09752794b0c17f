use crate::RedactedPhoneNumber;

/// **VALUE**: Phone numbers are PII and end up in status lines and logs.
///
/// **BUG THIS CATCHES**: Would catch a Display/Debug change that leaks the
/// full number into log files.
#[test]
fn given_phone_number_when_formatted_then_only_last_four_digits_visible() {
    // GIVEN: A normalized number
    let phone = RedactedPhoneNumber::new(String::from("+14155551234"));

    // WHEN: Formatting both ways
    let shown = phone.to_string();
    let debugged = format!("{phone:?}");

    // THEN: Only the tail survives
    assert_eq!(shown, "+*******1234");
    assert!(!debugged.contains("4155551234"));
    assert_eq!(phone.as_str(), "+14155551234");
    assert_eq!(phone.digit_count(), 11);
}

#[test]
fn given_phone_number_when_serialized_then_fails() {
    let phone = RedactedPhoneNumber::new(String::from("+14155551234"));

    let result = serde_json::to_string(&phone);

    assert!(result.is_err(), "Phone numbers must never be serialized");
}
