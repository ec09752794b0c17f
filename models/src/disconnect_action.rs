use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

/// Recovery policy for a closed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectAction {
    /// Reconnect with the same credentials after backoff.
    Retry,
    /// Credentials are unusable: wipe them and authenticate again.
    WipeAndReauth,
    /// Logged out: clear the session and wait for a new auth choice.
    Terminal,
}

impl Display for DisconnectAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(match self {
            DisconnectAction::Retry => "retry",
            DisconnectAction::WipeAndReauth => "wipe_and_reauth",
            DisconnectAction::Terminal => "terminal",
        })
    }
}
