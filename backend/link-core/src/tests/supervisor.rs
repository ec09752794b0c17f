// Unit tests for the supervisor decisions

use crate::error::{AuthError, ConfigError, ConnectionError, CoreError, SessionError};
use crate::supervisor::{decide, directive_for_exit};
use crate::{EXIT_RESTART, EXIT_STARTUP_FAILURE};

use common::ErrorLocation;
use models::SupervisorDirective;

fn ceiling_failure() -> CoreError {
    ConnectionError::ceiling_exceeded(3, 3).into()
}

#[test]
fn given_ceiling_failure_within_restart_budget_when_decided_then_restart_in_process() {
    for restarts in 1..=3 {
        assert_eq!(
            decide(&ceiling_failure(), restarts, 3),
            SupervisorDirective::RestartInProcess
        );
    }
}

/// **VALUE**: The in-process ceiling escalates to a process restart.
///
/// **WHY THIS MATTERS**: Some failures only clear with a fresh process (leaked
/// sockets, wedged protocol state). Restarting in-process forever would hide
/// them.
#[test]
fn given_restart_budget_used_up_when_decided_then_restart_process() {
    assert_eq!(
        decide(&ceiling_failure(), 4, 3),
        SupervisorDirective::RestartProcess
    );
    assert_eq!(
        decide(&CoreError::unexpected("worker panicked"), 4, 3),
        SupervisorDirective::RestartProcess
    );
}

#[test]
fn given_startup_failures_when_decided_then_stop_with_code_one() {
    let failures = [
        CoreError::from(AuthError::validation("no phone configured")),
        CoreError::from(ConfigError::ValidationError {
            location: ErrorLocation::caller(),
            reason: "bad".into(),
        }),
    ];

    for failure in &failures {
        assert_eq!(
            decide(failure, 1, 3),
            SupervisorDirective::Stop {
                code: EXIT_STARTUP_FAILURE
            }
        );
    }
}

#[test]
fn given_session_write_failure_when_decided_then_restart_in_process() {
    let failure = CoreError::from(SessionError::Update {
        reason: "disk full".into(),
        location: ErrorLocation::caller(),
    });

    assert_eq!(decide(&failure, 1, 3), SupervisorDirective::RestartInProcess);
}

#[test]
fn given_pairing_code_failure_when_decided_then_continue() {
    let failure = CoreError::from(ConnectionError::pairing_code("rate limited"));

    assert_eq!(decide(&failure, 1, 3), SupervisorDirective::Continue);
}

#[test]
fn given_worker_exit_codes_when_interpreted_then_only_restart_code_respawns() {
    assert_eq!(
        directive_for_exit(Some(EXIT_RESTART), 1, 5),
        SupervisorDirective::RestartProcess
    );
    assert_eq!(
        directive_for_exit(Some(0), 0, 5),
        SupervisorDirective::Stop { code: 0 }
    );
    assert_eq!(
        directive_for_exit(Some(EXIT_STARTUP_FAILURE), 0, 5),
        SupervisorDirective::Stop {
            code: EXIT_STARTUP_FAILURE
        }
    );
    assert_eq!(
        directive_for_exit(None, 0, 5),
        SupervisorDirective::Stop {
            code: EXIT_STARTUP_FAILURE
        }
    );
}

#[test]
fn given_too_many_consecutive_restarts_when_interpreted_then_stop() {
    assert_eq!(
        directive_for_exit(Some(EXIT_RESTART), 5, 5),
        SupervisorDirective::RestartProcess
    );
    assert_eq!(
        directive_for_exit(Some(EXIT_RESTART), 6, 5),
        SupervisorDirective::Stop {
            code: EXIT_STARTUP_FAILURE
        }
    );
}
