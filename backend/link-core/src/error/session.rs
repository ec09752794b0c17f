use common::ErrorLocation;

use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Failures touching the persisted credential bundle.
#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Session Read Error: {path}: {source} {location}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Session Parse Error: {path}: {reason} {location}")]
    Parse {
        path: PathBuf,
        reason: String,
        location: ErrorLocation,
    },

    #[error("Session Identity Missing: {path} has no identity field {location}")]
    MissingIdentity {
        path: PathBuf,
        location: ErrorLocation,
    },

    #[error("Session Write Error: {path}: {source} {location}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Session Clear Error: could not remove {path}: {source} {location}")]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Session Directory Error: {path}: {source} {location}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Session Update Error: {reason} {location}")]
    Update {
        reason: String,
        location: ErrorLocation,
    },
}
