//! Domain models for linkbot.
//!
//! Pure data structures shared by the lifecycle logic in `link-core` and the
//! `linkbot` binary. Models carry no I/O; the few methods they have are
//! constructors, invariant checks and counter bookkeeping.

pub mod auth_attempt;
pub mod close_cause;
pub mod connection_status;
pub mod directive;
pub mod disconnect_action;
pub mod error;
pub mod retry_budget;

pub use auth_attempt::{AuthAttempt, AuthMethod};
pub use close_cause::CloseCause;
pub use connection_status::ConnectionStatus;
pub use directive::SupervisorDirective;
pub use disconnect_action::DisconnectAction;
pub use error::model_error::ModelError;
pub use retry_budget::RetryBudget;

#[cfg(test)]
mod tests;
