//! The two restart layers above the connection manager.
//!
//! - [`worker::WorkerSupervisor`] rebuilds the manager inside the worker
//!   process after an escalated failure.
//! - [`process::ProcessSupervisor`] respawns the worker process when it exits
//!   asking for a restart.
//!
//! The decisions themselves are pure functions so they can be checked
//! without terminating anything.

pub mod process;
pub mod worker;

pub use process::{ProcessSupervisor, directive_for_exit};
pub use worker::{ManagerFactory, WorkerSupervisor};

use crate::EXIT_STARTUP_FAILURE;
use crate::error::{AuthError, ConnectionError, CoreError, StateError};

use models::SupervisorDirective;

/// Decide what to do after the manager stopped with `failure`.
///
/// `restart_attempts` is the in-process restart count this failure would
/// bring the worker to. Restarts are allowed while it stays within
/// `max_restarts`; past that the worker asks for a fresh process.
pub fn decide(failure: &CoreError, restart_attempts: u32, max_restarts: u32) -> SupervisorDirective {
    match failure {
        CoreError::Config(_) | CoreError::Auth(AuthError::Validation { .. } | AuthError::Prompt { .. }) => {
            SupervisorDirective::Stop {
                code: EXIT_STARTUP_FAILURE,
            }
        }
        CoreError::Connection(ConnectionError::PairingCode { .. })
        | CoreError::State(StateError::NoManager { .. }) => SupervisorDirective::Continue,
        CoreError::Auth(AuthError::Session(_))
        | CoreError::Session(_)
        | CoreError::Connection(_)
        | CoreError::State(StateError::Actor { .. })
        | CoreError::Supervisor(_)
        | CoreError::Unexpected { .. } => {
            if restart_attempts <= max_restarts {
                SupervisorDirective::RestartInProcess
            } else {
                SupervisorDirective::RestartProcess
            }
        }
    }
}
