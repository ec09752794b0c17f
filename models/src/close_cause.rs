use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

const STATUS_LOGGED_OUT: u16 = 401;
const STATUS_CONNECTION_LOST: u16 = 408;
const STATUS_CONNECTION_CLOSED: u16 = 428;
const STATUS_CONNECTION_REPLACED: u16 = 440;
const STATUS_BAD_SESSION: u16 = 500;
const STATUS_RESTART_REQUIRED: u16 = 515;

/// Why the protocol layer closed a socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseCause {
    LoggedOut,
    BadSession,
    ConnectionReplaced,
    ConnectionClosed,
    ConnectionLost,
    TimedOut,
    RestartRequired,
    Unknown {
        status_code: Option<u16>,
        reason: String,
    },
}

impl CloseCause {
    /// Map a numeric close status to a cause.
    pub fn from_status_code(status_code: u16) -> Self {
        match status_code {
            STATUS_LOGGED_OUT => CloseCause::LoggedOut,
            STATUS_CONNECTION_LOST => CloseCause::ConnectionLost,
            STATUS_CONNECTION_CLOSED => CloseCause::ConnectionClosed,
            STATUS_CONNECTION_REPLACED => CloseCause::ConnectionReplaced,
            STATUS_BAD_SESSION => CloseCause::BadSession,
            STATUS_RESTART_REQUIRED => CloseCause::RestartRequired,
            other => CloseCause::Unknown {
                status_code: Some(other),
                reason: String::from("unrecognized status code"),
            },
        }
    }

    /// Build a cause from the bridge's reason name, falling back to the status
    /// code when the name is absent or unrecognized.
    pub fn from_wire(reason: Option<&str>, status_code: Option<u16>) -> Self {
        let named = reason.and_then(|name| match name {
            "loggedOut" | "logged_out" => Some(CloseCause::LoggedOut),
            "badSession" | "bad_session" => Some(CloseCause::BadSession),
            "connectionReplaced" | "connection_replaced" => Some(CloseCause::ConnectionReplaced),
            "connectionClosed" | "connection_closed" => Some(CloseCause::ConnectionClosed),
            "connectionLost" | "connection_lost" => Some(CloseCause::ConnectionLost),
            "timedOut" | "timed_out" => Some(CloseCause::TimedOut),
            "restartRequired" | "restart_required" => Some(CloseCause::RestartRequired),
            _ => None,
        });

        match (named, status_code) {
            (Some(cause), _) => cause,
            (None, Some(code)) => match CloseCause::from_status_code(code) {
                CloseCause::Unknown { status_code, .. } => CloseCause::Unknown {
                    status_code,
                    reason: reason.unwrap_or("unrecognized status code").to_string(),
                },
                cause => cause,
            },
            (None, None) => CloseCause::Unknown {
                status_code: None,
                reason: reason.unwrap_or("no reason given").to_string(),
            },
        }
    }

    /// Whether this is one of the causes with a dedicated recovery rule.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, CloseCause::Unknown { .. })
    }
}

impl Display for CloseCause {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            CloseCause::LoggedOut => formatter.write_str("logged out"),
            CloseCause::BadSession => formatter.write_str("bad session"),
            CloseCause::ConnectionReplaced => formatter.write_str("connection replaced"),
            CloseCause::ConnectionClosed => formatter.write_str("connection closed"),
            CloseCause::ConnectionLost => formatter.write_str("connection lost"),
            CloseCause::TimedOut => formatter.write_str("timed out"),
            CloseCause::RestartRequired => formatter.write_str("restart required"),
            CloseCause::Unknown {
                status_code: Some(code),
                reason,
            } => write!(formatter, "unknown ({code}: {reason})"),
            CloseCause::Unknown {
                status_code: None,
                reason,
            } => write!(formatter, "unknown ({reason})"),
        }
    }
}
