use crate::lifecycle_tests::helpers::{Harness, ScriptedProtocol};

use link_core::auth::{AuthMethodSelector, SelectorMode};
use link_core::config::{AuthPreferences, SupervisorConfig};
use link_core::connection::{ConnectionManager, LifecycleContext};
use link_core::error::{ConnectionError, CoreError, StateError};
use link_core::protocol::{OpenOptions, SessionProtocol, SocketHandle};
use link_core::supervisor::WorkerSupervisor;
use link_core::{EXIT_RESTART, EXIT_STARTUP_FAILURE};
use models::ConnectionStatus;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

fn fast_restarts(max_restarts: u32) -> SupervisorConfig {
    SupervisorConfig {
        max_restarts,
        restart_delay: Duration::from_millis(100),
        ..SupervisorConfig::default()
    }
}

/// **VALUE**: Repeated ceiling failures walk through every in-process restart
/// before asking the process supervisor for a fresh process.
///
/// **WHY THIS MATTERS**: The two ceilings nest. If the inner one never
/// escalates, a wedged worker sits in a restart loop forever.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Restart attempts are not counted
/// - Connection attempts are not reset between in-process restarts
/// - The worker exits with a code the process supervisor does not respawn on
#[tokio::test(start_paused = true)]
async fn given_remote_always_drops_when_supervised_then_restarts_in_process_then_exits_for_restart() {
    // GIVEN
    let protocol = ScriptedProtocol::new(Vec::new());
    let harness = Harness::new(protocol.clone());
    let ctx = harness.context();
    let store = harness.store.clone();
    let factory = move || -> Result<ConnectionManager, CoreError> {
        Ok(ConnectionManager::new(
            ctx.clone(),
            AuthMethodSelector::new(
                store.clone(),
                SelectorMode::NonInteractive(AuthPreferences::default()),
            ),
        ))
    };
    let mut supervisor = WorkerSupervisor::new(
        harness.state.clone(),
        harness.presenter.clone(),
        fast_restarts(2),
        factory,
    );

    // WHEN
    let code = supervisor.run().await;

    // THEN: 3 managers x 3 opens each
    assert_eq!(code, EXIT_RESTART);
    assert_eq!(protocol.opens().len(), 9);
    assert_eq!(harness.state.retry_budget().await.restart_attempts, 2);
    assert!(harness.presenter.saw_status("requesting a fresh process"));
}

struct PanickingProtocol {
    opens: AtomicU32,
}

#[async_trait]
impl SessionProtocol for PanickingProtocol {
    async fn open(&self, _options: OpenOptions) -> Result<SocketHandle, ConnectionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        panic!("protocol library bug");
    }
}

/// **VALUE**: A panicking manager is restarted like any other failure and
/// leaves the dashboard an honest status.
///
/// **BUG THIS CATCHES**: Would catch if the panic escapes the worker, or if
/// the status stays at `Connecting` with a dead manager still attached.
#[tokio::test(start_paused = true)]
async fn given_manager_panics_when_supervised_then_treated_as_unexpected_failure() {
    // GIVEN
    let protocol = Arc::new(PanickingProtocol {
        opens: AtomicU32::new(0),
    });
    let harness = Harness::new(ScriptedProtocol::new(Vec::new()));
    let ctx = LifecycleContext {
        protocol: protocol.clone(),
        ..harness.context()
    };
    let store = harness.store.clone();
    let factory = move || -> Result<ConnectionManager, CoreError> {
        Ok(ConnectionManager::new(
            ctx.clone(),
            AuthMethodSelector::new(
                store.clone(),
                SelectorMode::NonInteractive(AuthPreferences::default()),
            ),
        ))
    };
    let mut supervisor = WorkerSupervisor::new(
        harness.state.clone(),
        harness.presenter.clone(),
        fast_restarts(1),
        factory,
    );

    // WHEN
    let code = supervisor.run().await;

    // THEN: one restart in process, then escalate
    assert_eq!(code, EXIT_RESTART);
    assert_eq!(protocol.opens.load(Ordering::SeqCst), 2);

    // THEN: The dashboard sees the failure and no live manager
    let handle = harness.state.control_handle();
    assert_eq!(handle.connection_status().await, ConnectionStatus::TerminalError);
    assert!(matches!(
        handle.restart(false).await,
        Err(StateError::NoManager { .. })
    ));
}

#[tokio::test]
async fn given_headless_pairing_without_phone_when_supervised_then_stops_with_startup_failure() {
    // GIVEN
    let harness = Harness::new(ScriptedProtocol::new(Vec::new()));
    let ctx = harness.context();
    let store = harness.store.clone();
    let factory = move || -> Result<ConnectionManager, CoreError> {
        Ok(ConnectionManager::new(
            ctx.clone(),
            AuthMethodSelector::new(
                store.clone(),
                SelectorMode::NonInteractive(AuthPreferences {
                    preferred_method: Some(models::AuthMethod::Pairing),
                    phone_number: None,
                }),
            ),
        ))
    };
    let mut supervisor = WorkerSupervisor::new(
        harness.state.clone(),
        harness.presenter.clone(),
        fast_restarts(3),
        factory,
    );

    // WHEN
    let code = supervisor.run().await;

    // THEN
    assert_eq!(code, EXIT_STARTUP_FAILURE);
    assert!(harness.presenter.saw_status("Stopping"));
}

#[tokio::test]
async fn given_factory_fails_when_supervised_then_failure_is_decided_like_any_other() {
    let harness = Harness::new(ScriptedProtocol::new(Vec::new()));
    let factory = || -> Result<ConnectionManager, CoreError> {
        Err(link_core::error::AuthError::validation("bad configuration").into())
    };
    let mut supervisor = WorkerSupervisor::new(
        harness.state.clone(),
        harness.presenter.clone(),
        fast_restarts(3),
        factory,
    );

    assert_eq!(supervisor.run().await, EXIT_STARTUP_FAILURE);
}
