use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// A redacted value was asked to leave the process in clear form.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Redaction Error: {type_name} cannot be serialized, use as_str() explicitly {location}")]
    Serialization {
        type_name: &'static str,
        location: ErrorLocation,
    },
}
