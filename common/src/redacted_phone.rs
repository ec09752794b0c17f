//! Phone number wrapper that keeps the full number out of logs.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// Number of trailing digits left visible when displayed.
const VISIBLE_TAIL: usize = 4;

/// A normalized phone number (`+` followed by digits) that masks itself in
/// `Debug` and `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedPhoneNumber {
    inner: String,
}

impl RedactedPhoneNumber {
    /// Wrap an already-normalized number.
    pub fn new(number: String) -> Self {
        Self { inner: number }
    }

    /// The full number, for the pairing request itself.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Count of digits in the number (safe to log).
    pub fn digit_count(&self) -> usize {
        self.inner.chars().filter(char::is_ascii_digit).count()
    }

    /// Masked form, e.g. `+*******1234`.
    pub fn masked(&self) -> String {
        let digits: Vec<char> = self.inner.chars().filter(char::is_ascii_digit).collect();
        let hidden = digits.len().saturating_sub(VISIBLE_TAIL);
        let tail: String = digits[hidden..].iter().collect();
        format!("+{}{}", "*".repeat(hidden), tail)
    }
}

impl fmt::Debug for RedactedPhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedPhoneNumber({})", self.masked())
    }
}

impl fmt::Display for RedactedPhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl Drop for RedactedPhoneNumber {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Prevent accidental serialization
impl serde::Serialize for RedactedPhoneNumber {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Serialization {
            type_name: "RedactedPhoneNumber",
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
