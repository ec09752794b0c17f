use common::ErrorLocation;
use link_core::error::{CoreError, SupervisorError};

use thiserror::Error;

/// Failures the binary reports before turning them into an exit code.
#[derive(Debug, Error)]
pub enum LinkbotError {
    /// Startup problem in the binary itself (log setup, missing bridge).
    #[error("Linkbot Error: {message} {location}")]
    Linkbot {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
