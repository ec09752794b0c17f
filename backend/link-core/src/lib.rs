pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod session_store;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub const LINKBOT_NAME: &str = "linkbot";
pub const LINKBOT_ENV_PREFIX: &str = "LINKBOT_";
pub const CREDENTIALS_FILE_NAME: &str = "creds.json";
pub const CREDENTIALS_DIR_NAME: &str =
    const_format::concatcp!(LINKBOT_NAME, "/auth");

/// Exit code for a normal or operator-requested shutdown.
pub const EXIT_OK: i32 = 0;
/// Exit code for a failure that a restart cannot fix.
pub const EXIT_STARTUP_FAILURE: i32 = 1;
/// Exit code asking the process supervisor for a fresh process.
pub const EXIT_RESTART: i32 = 2;
