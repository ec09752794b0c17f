use crate::AuthMethod;

use common::ErrorLocation;

use thiserror::Error as ThisError;

/// An [`AuthAttempt`](crate::AuthAttempt) that could never be carried out.
#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("Auth Attempt Error: no auth method chosen {location}")]
    MissingMethod { location: ErrorLocation },

    #[error("Auth Attempt Error: pairing requires a phone number {location}")]
    PhoneRequired { location: ErrorLocation },

    #[error("Auth Attempt Error: auth method '{method}' does not take a phone number {location}")]
    UnexpectedPhone {
        method: AuthMethod,
        location: ErrorLocation,
    },
}
