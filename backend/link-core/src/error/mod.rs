pub mod auth;
pub mod config;
pub mod connection;
pub mod session;
pub mod state;
pub mod supervisor;

pub use auth::AuthError;
pub use config::ConfigError;
pub use connection::ConnectionError;
pub use session::SessionError;
pub use state::StateError;
pub use supervisor::SupervisorError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// A panic or otherwise unanticipated failure inside the worker.
    #[error("Unexpected Failure: {message} {location}")]
    Unexpected {
        message: String,
        location: ErrorLocation,
    },
}

impl CoreError {
    #[track_caller]
    pub fn unexpected(message: impl Into<String>) -> Self {
        CoreError::Unexpected {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
