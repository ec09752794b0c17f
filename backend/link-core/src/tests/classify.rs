// Unit tests for disconnect classification

use crate::connection::classify;

use models::{CloseCause, DisconnectAction};

/// **VALUE**: Pins every recognized cause to its recovery action.
///
/// **WHY THIS MATTERS**: Classification is the single place the recovery policy
/// lives. A wrong arm either wipes a good session or retries a dead one forever.
///
/// **BUG THIS CATCHES**: Swapping `BadSession` into the retry arm, or treating a
/// logout as retryable.
#[test]
fn given_recognized_causes_when_classified_then_map_to_fixed_actions() {
    let cases = [
        (CloseCause::LoggedOut, DisconnectAction::Terminal),
        (CloseCause::BadSession, DisconnectAction::WipeAndReauth),
        (CloseCause::ConnectionReplaced, DisconnectAction::WipeAndReauth),
        (CloseCause::ConnectionClosed, DisconnectAction::Retry),
        (CloseCause::ConnectionLost, DisconnectAction::Retry),
        (CloseCause::TimedOut, DisconnectAction::Retry),
        (CloseCause::RestartRequired, DisconnectAction::Retry),
    ];

    for (cause, expected) in cases {
        assert_eq!(classify(&cause), expected, "cause: {cause}");
    }
}

#[test]
fn given_unknown_status_code_when_classified_then_retries() {
    // GIVEN: A status code with no dedicated rule
    let cause = CloseCause::from_status_code(499);

    // WHEN / THEN
    assert!(!cause.is_recognized());
    assert_eq!(classify(&cause), DisconnectAction::Retry);
}

#[test]
fn given_same_cause_when_classified_twice_then_result_is_stable() {
    let cause = CloseCause::from_wire(Some("connectionReplaced"), Some(440));
    assert_eq!(classify(&cause), classify(&cause.clone()));
}
