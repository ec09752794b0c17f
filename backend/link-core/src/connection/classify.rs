use models::{CloseCause, DisconnectAction};

/// Map a close cause to its recovery action.
///
/// `LoggedOut` is terminal: the session is gone for good and only a new
/// authentication helps. A bad or replaced session is wiped and
/// re-authenticated. Everything else, including causes we do not recognize,
/// is retried with the credentials kept.
pub fn classify(cause: &CloseCause) -> DisconnectAction {
    match cause {
        CloseCause::LoggedOut => DisconnectAction::Terminal,
        CloseCause::BadSession | CloseCause::ConnectionReplaced => DisconnectAction::WipeAndReauth,
        CloseCause::ConnectionClosed
        | CloseCause::ConnectionLost
        | CloseCause::TimedOut
        | CloseCause::RestartRequired
        | CloseCause::Unknown { .. } => DisconnectAction::Retry,
    }
}
