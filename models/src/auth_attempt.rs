use crate::ModelError;

use common::{ErrorLocation, RedactedPhoneNumber};

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// How a connection attempt authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Display QR payloads for a paired device to scan.
    Qr,
    /// Request a numeric pairing code for a phone number.
    Pairing,
    /// Replay the persisted credential bundle.
    Reuse,
    /// Wipe persisted credentials and choose again.
    Clear,
    /// Deliberate operator shutdown.
    Exit,
}

impl AuthMethod {
    /// Whether this method opens a socket at all.
    pub fn opens_socket(self) -> bool {
        matches!(self, AuthMethod::Qr | AuthMethod::Pairing | AuthMethod::Reuse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Qr => "qr",
            AuthMethod::Pairing => "pairing",
            AuthMethod::Reuse => "reuse",
            AuthMethod::Clear => "clear",
            AuthMethod::Exit => "exit",
        }
    }
}

impl Display for AuthMethod {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

/// One resolved authentication choice. Lives for a single connection
/// attempt and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    method: AuthMethod,
    phone_number: Option<RedactedPhoneNumber>,
}

impl AuthAttempt {
    pub fn qr() -> Self {
        Self {
            method: AuthMethod::Qr,
            phone_number: None,
        }
    }

    pub fn reuse() -> Self {
        Self {
            method: AuthMethod::Reuse,
            phone_number: None,
        }
    }

    pub fn exit() -> Self {
        Self {
            method: AuthMethod::Exit,
            phone_number: None,
        }
    }

    /// Pairing attempt for an already-normalized phone number.
    pub fn pairing(phone_number: RedactedPhoneNumber) -> Self {
        Self {
            method: AuthMethod::Pairing,
            phone_number: Some(phone_number),
        }
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    pub fn phone_number(&self) -> Option<&RedactedPhoneNumber> {
        self.phone_number.as_ref()
    }
}

/// Builder for attempts assembled from loosely typed input (menu choices,
/// environment variables).
#[derive(Debug, Default)]
pub struct AuthAttemptBuilder {
    method: Option<AuthMethod>,
    phone_number: Option<RedactedPhoneNumber>,
}

impl AuthAttemptBuilder {
    pub fn with_method(mut self, method: AuthMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_phone_number(mut self, phone_number: RedactedPhoneNumber) -> Self {
        self.phone_number = Some(phone_number);
        self
    }

    /// Build the attempt, enforcing that only pairing carries a phone number.
    #[track_caller]
    pub fn build(self) -> Result<AuthAttempt, ModelError> {
        let method = self.method.ok_or_else(|| ModelError::MissingMethod {
            location: ErrorLocation::from(Location::caller()),
        })?;

        match (method, self.phone_number) {
            (AuthMethod::Pairing, Some(phone)) => Ok(AuthAttempt::pairing(phone)),
            (AuthMethod::Pairing, None) => Err(ModelError::PhoneRequired {
                location: ErrorLocation::from(Location::caller()),
            }),
            (other, Some(_)) => Err(ModelError::UnexpectedPhone {
                method: other,
                location: ErrorLocation::from(Location::caller()),
            }),
            (other, None) => Ok(AuthAttempt {
                method: other,
                phone_number: None,
            }),
        }
    }
}
