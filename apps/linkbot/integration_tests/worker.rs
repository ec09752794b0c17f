use linkbot::bootstrap::run_worker;

use link_core::EXIT_STARTUP_FAILURE;
use link_core::config::{BotConfig, ENV_AUTH_DIR, ENV_LOG_DIR, ENV_ROLE};

use tempfile::TempDir;

/// **VALUE**: A worker without a bridge command fails fast with the startup
/// exit code.
///
/// **WHY THIS MATTERS**: The process supervisor respawns only on exit code 2.
/// Reporting a missing bridge as a restartable failure would respawn a worker
/// that can never connect.
#[tokio::test]
async fn given_no_bridge_command_when_worker_runs_then_startup_failure() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let auth_dir = dir.path().join("auth").display().to_string();
    let log_dir = dir.path().join("logs").display().to_string();
    let config = BotConfig::from_lookup(|name| match name {
        n if n == ENV_ROLE => Some("worker".to_string()),
        n if n == ENV_AUTH_DIR => Some(auth_dir.clone()),
        n if n == ENV_LOG_DIR => Some(log_dir.clone()),
        _ => None,
    })
    .unwrap();

    // WHEN
    let code = run_worker(&config).await;

    // THEN
    assert_eq!(code, EXIT_STARTUP_FAILURE);
}
