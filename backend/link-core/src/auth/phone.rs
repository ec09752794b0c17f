//! Phone number validation for pairing-code authentication.

use crate::error::auth::AuthError;

use common::RedactedPhoneNumber;

use std::sync::OnceLock;

use regex::Regex;

const NORMALIZED_PHONE_PATTERN: &str = r"^\+\d{10,15}$";

static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_phone_regex() -> &'static Regex {
    PHONE_REGEX.get_or_init(|| Regex::new(NORMALIZED_PHONE_PATTERN).expect("valid regex pattern"))
}

/// Normalize and validate a phone number for pairing.
///
/// The input must start with `+`; every non-digit after it is dropped
/// (spaces, dashes, parentheses) and 10 to 15 digits must remain. The result
/// is `+` followed by the digits.
///
/// # Errors
///
/// Returns [`AuthError::Validation`] when the leading `+` is missing or the
/// digit count is out of range.
#[track_caller]
pub fn normalize_phone_number(raw: &str) -> Result<RedactedPhoneNumber, AuthError> {
    let trimmed = raw.trim();

    if !trimmed.starts_with('+') {
        return Err(AuthError::validation(
            "Phone number must start with '+' followed by the country code",
        ));
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let normalized = format!("+{digits}");

    if !get_phone_regex().is_match(&normalized) {
        return Err(AuthError::validation(format!(
            "Phone number must have 10 to 15 digits, got {}",
            digits.len()
        )));
    }

    Ok(RedactedPhoneNumber::new(normalized))
}
