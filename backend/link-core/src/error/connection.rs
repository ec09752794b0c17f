use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConnectionError {
    /// No open and no auth activity inside the armed window.
    #[error("Connect Timeout: {message} {location}")]
    ConnectTimeout {
        message: String,
        location: ErrorLocation,
    },

    /// A retry ceiling was reached; surfaced instead of scheduling.
    #[error("Ceiling Exceeded: {attempts} of {ceiling} connection attempts used {location}")]
    CeilingExceeded {
        attempts: u32,
        ceiling: u32,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Pairing Code Error: {message} {location}")]
    PairingCode {
        message: String,
        location: ErrorLocation,
    },
}

impl ConnectionError {
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        ConnectionError::Protocol {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn pairing_code(message: impl Into<String>) -> Self {
        ConnectionError::PairingCode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn ceiling_exceeded(attempts: u32, ceiling: u32) -> Self {
        ConnectionError::CeilingExceeded {
            attempts,
            ceiling,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IoError> for ConnectionError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        ConnectionError::Protocol {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for ConnectionError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        ConnectionError::Protocol {
            message: format!("Bridge message encoding failed: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
