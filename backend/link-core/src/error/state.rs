use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StateError {
    #[error("State Actor Error: {message} {location}")]
    Actor {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Manager Error: {message} {location}")]
    NoManager {
        message: String,
        location: ErrorLocation,
    },
}
