use common::ErrorLocation;

use serde::de::StdError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Wait Error: {message} {location}")]
    Wait {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The process-level restart ceiling was reached.
    #[error("Ceiling Exceeded: worker asked for {restarts} consecutive restarts (limit {ceiling}) {location}")]
    CeilingExceeded {
        restarts: u32,
        ceiling: u32,
        location: ErrorLocation,
    },
}
