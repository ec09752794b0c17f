// Unit tests for logger initialization

use crate::logger::{LOG_FILE_NAME, initialize};

use link_core::config::ProcessRole;

use log::LevelFilter;
use tempfile::TempDir;

/// **VALUE**: Calling `initialize()` more than once is harmless.
///
/// **WHY THIS MATTERS**: The worker rebuilds its manager in-process; if any path
/// re-ran logger setup and fern refused a second global logger, the restart
/// would crash instead.
///
/// **BUG THIS CATCHES**: Removing the `Once` / `AtomicBool` guards.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN
    let dir = TempDir::new().unwrap();

    // WHEN
    let first = initialize(dir.path(), Some(LevelFilter::Info), ProcessRole::Worker);
    let second = initialize(dir.path(), None, ProcessRole::Supervisor);

    // THEN
    assert!(first.is_ok(), "First initialization should succeed: {first:?}");
    assert!(second.is_ok(), "Second initialization should be a no-op");
    assert!(dir.path().join(LOG_FILE_NAME).exists());
}
