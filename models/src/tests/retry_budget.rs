use crate::RetryBudget;

#[test]
fn given_budget_when_attempts_begin_then_counts_up_and_reset_clears_only_connections() {
    // GIVEN: A fresh budget with one restart on record
    let mut budget = RetryBudget::default();
    budget.record_restart();

    // WHEN: Two attempts begin, then a successful open resets
    assert_eq!(budget.begin_connection_attempt(), 1);
    assert_eq!(budget.begin_connection_attempt(), 2);
    budget.reset_connection_attempts();

    // THEN: Connection counter is zero, restart counter untouched
    assert_eq!(budget.connection_attempts, 0);
    assert_eq!(budget.restart_attempts, 1);
}

#[test]
fn given_ceilings_when_checked_then_connection_uses_reached_and_restart_uses_exceeded() {
    let budget = RetryBudget {
        connection_attempts: 3,
        restart_attempts: 3,
    };

    assert!(budget.connection_exhausted(3));
    assert!(!budget.restarts_exhausted(3));
    assert!(
        RetryBudget {
            restart_attempts: 4,
            ..budget
        }
        .restarts_exhausted(3)
    );
}
