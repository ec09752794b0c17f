use crate::error::SessionError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AuthError {
    /// Input that can never authenticate, such as a malformed phone number.
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Prompt Error: {message} {location}")]
    Prompt {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AuthError {
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn prompt(message: impl Into<String>) -> Self {
        AuthError::Prompt {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for AuthError {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        AuthError::Prompt {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
