use crate::connection::ReconnectPolicy;
use crate::error::ConnectionError;

use models::RetryBudget;

use std::time::Duration;

fn default_policy() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(1_000), Duration::from_millis(10_000), 3)
}

/// **VALUE**: Checks the documented delay sequence, including the cap.
///
/// **BUG THIS CATCHES**: Off-by-one in the exponent (first retry waiting 2 s),
/// or jitter leaking through from the backoff crate.
#[test]
fn given_default_policy_when_next_delay_then_doubles_up_to_cap() {
    let policy = default_policy();

    let delays: Vec<u128> = (1..=5).map(|n| policy.next_delay(n).as_millis()).collect();

    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000]);
    assert_eq!(policy.next_delay(12), Duration::from_millis(10_000));
}

#[test]
fn given_attempt_zero_when_next_delay_then_treated_as_first() {
    assert_eq!(default_policy().next_delay(0), Duration::from_millis(1_000));
}

#[test]
fn given_one_failed_open_when_scheduled_then_waits_for_second_attempt_delay() {
    // GIVEN: The first open of the process failed
    let budget = RetryBudget {
        connection_attempts: 1,
        restart_attempts: 0,
    };

    // WHEN
    let delay = default_policy().schedule(&budget).expect("retry allowed");

    // THEN: The next attempt is number 2
    assert_eq!(delay, Duration::from_millis(2_000));
}

/// **VALUE**: The connection ceiling is enforced before a fourth open.
///
/// **WHY THIS MATTERS**: Without the ceiling a flapping remote keeps the bot
/// retrying forever instead of escalating to a restart.
#[test]
fn given_ceiling_reached_when_scheduled_then_ceiling_exceeded() {
    let budget = RetryBudget {
        connection_attempts: 3,
        restart_attempts: 0,
    };

    let result = default_policy().schedule(&budget);

    match result {
        Err(ConnectionError::CeilingExceeded {
            attempts, ceiling, ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(ceiling, 3);
        }
        other => panic!("expected CeilingExceeded, got {other:?}"),
    }
}

#[test]
fn given_reset_budget_when_checked_then_ceiling_passes() {
    let mut budget = RetryBudget {
        connection_attempts: 3,
        restart_attempts: 1,
    };
    budget.reset_connection_attempts();

    assert!(default_policy().check_ceiling(&budget).is_ok());
}
