//! Shared primitives for linkbot.
//!
//! This crate holds the small building blocks every layer needs:
//! error locations for structured errors and a privacy wrapper for
//! phone numbers.
//!
//! ## Architecture
//!
//! - **common** (this crate): Cross-cutting primitives
//! - **models**: Pure data structures
//! - **link-core**: Session and connection lifecycle logic
//! - **linkbot**: Binary wiring everything together

pub mod error;
pub mod redacted_phone;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_phone::RedactedPhoneNumber;

#[cfg(test)]
mod tests;
