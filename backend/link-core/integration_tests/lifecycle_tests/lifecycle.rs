use crate::lifecycle_tests::helpers::{
    Harness, ScriptedProtocol, SilentPrompter, Step, identity_delta, wait_for_status, wait_until,
};

use link_core::auth::{AuthMethodSelector, Prompter, SelectorMode};
use link_core::config::AuthPreferences;
use link_core::connection::{ConnectionManager, LifecycleContext, LifecycleExit};
use link_core::error::{AuthError, ConnectionError, CoreError};
use link_core::protocol::{OpenOptions, SessionProtocol, SocketEvent, SocketHandle};
use link_core::runtime::AuthChallenge;

use models::{AuthMethod, CloseCause, ConnectionStatus};

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep, timeout};

/// **VALUE**: The headline recovery path: QR shown, connection lost, one
/// backoff, then a successful link.
///
/// **WHY THIS MATTERS**: Network blips during the first scan are the most
/// common failure in the field. The bot must retry on its own, wait the
/// documented delay, and leave the attempt counter at zero once linked.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The retry delay is computed from the wrong attempt number
/// - A successful open does not reset the connection counter
/// - QR refreshes of the second attempt are not displayed
#[tokio::test(start_paused = true)]
async fn given_qr_attempt_when_connection_lost_then_retries_after_two_seconds_and_connects() {
    // GIVEN: No persisted session; first socket drops after showing a QR,
    // second one gets scanned
    let protocol = ScriptedProtocol::new(vec![
        vec![
            Step::Emit(SocketEvent::Qr("ref-1".into())),
            Step::Emit(SocketEvent::Close(CloseCause::ConnectionLost)),
        ],
        vec![
            Step::Emit(SocketEvent::Qr("ref-2".into())),
            Step::Wait(Duration::from_secs(5)),
            Step::Emit(identity_delta()),
            Step::Emit(SocketEvent::Open),
            Step::Hold,
        ],
    ]);
    let harness = Harness::new(protocol.clone());
    let mut manager = harness.headless_manager();

    // WHEN
    let task = tokio::spawn(async move { manager.run().await });
    wait_for_status(&harness.state, ConnectionStatus::Connected).await;

    // THEN
    let opens = protocol.opens();
    assert_eq!(opens.len(), 2);
    assert!(opens.iter().all(|open| open.method == AuthMethod::Qr));
    let gap = opens[1].at - opens[0].at;
    assert!(
        gap >= Duration::from_millis(2_000) && gap < Duration::from_millis(2_100),
        "retry gap was {gap:?}"
    );

    assert_eq!(harness.state.retry_budget().await.connection_attempts, 0);
    assert_eq!(
        harness.presenter.qr.lock().unwrap().as_slice(),
        [("ref-1".to_string(), 1), ("ref-2".to_string(), 1)]
    );
    assert!(harness.store.has_session().await);
    assert_eq!(*harness.dispatcher.attached.lock().unwrap(), 1);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn given_persisted_session_when_started_then_connects_without_selector() {
    // GIVEN
    let protocol = ScriptedProtocol::new(vec![vec![Step::Emit(SocketEvent::Open), Step::Hold]]);
    let harness = Harness::new(protocol.clone());
    harness.persist_session().await;
    let mut manager = harness.manager(SelectorMode::Interactive(Box::new(SilentPrompter)));

    // WHEN
    let task = tokio::spawn(async move { manager.run().await });
    wait_for_status(&harness.state, ConnectionStatus::Connected).await;

    // THEN
    let opens = protocol.opens();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0].method, AuthMethod::Reuse);
    assert!(opens[0].credentials.is_some());
    assert!(harness.presenter.qr.lock().unwrap().is_empty());

    task.abort();
}

/// **VALUE**: A remote logout wipes the session and waits for a new
/// authentication instead of retrying.
///
/// **WHY THIS MATTERS**: Retrying a logged-out session hammers the remote with
/// credentials it already revoked.
///
/// **BUG THIS CATCHES**: Classifying `LoggedOut` as transient, or leaving the
/// revoked bundle on disk.
#[tokio::test(start_paused = true)]
async fn given_live_session_when_logged_out_then_cleared_and_awaiting_auth_without_retry() {
    // GIVEN: An operator who never answers the menu
    let protocol = ScriptedProtocol::new(vec![vec![
        Step::Emit(SocketEvent::Open),
        Step::Wait(Duration::from_secs(1)),
        Step::Emit(SocketEvent::Close(CloseCause::LoggedOut)),
        Step::Hold,
    ]]);
    let harness = Harness::new(protocol.clone());
    harness.persist_session().await;
    let mut manager = harness.manager(SelectorMode::Interactive(Box::new(SilentPrompter)));

    // WHEN
    let task = tokio::spawn(async move { manager.run().await });
    wait_for_status(&harness.state, ConnectionStatus::Connected).await;
    wait_for_status(&harness.state, ConnectionStatus::AwaitingAuth).await;
    sleep(Duration::from_secs(60)).await;

    // THEN
    assert_eq!(protocol.opens().len(), 1);
    assert!(!harness.store.credentials_path().exists());
    assert!(harness.presenter.saw_status("Session expired"));
    assert_eq!(harness.state.status().await, ConnectionStatus::AwaitingAuth);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn given_remote_keeps_dropping_when_retrying_then_ceiling_exceeded_after_three_opens() {
    // GIVEN: Every socket closes at once
    let protocol = ScriptedProtocol::new(Vec::new());
    let harness = Harness::new(protocol.clone());
    let mut manager = harness.headless_manager();

    // WHEN
    let result = manager.run().await;

    // THEN
    match result {
        Err(CoreError::Connection(ConnectionError::CeilingExceeded {
            attempts, ceiling, ..
        })) => {
            assert_eq!(attempts, 3);
            assert_eq!(ceiling, 3);
        }
        other => panic!("expected CeilingExceeded, got {other:?}"),
    }

    let opens = protocol.opens();
    assert_eq!(opens.len(), 3);
    assert_eq!((opens[1].at - opens[0].at).as_millis(), 2_000);
    assert_eq!((opens[2].at - opens[1].at).as_millis(), 4_000);
    assert_eq!(harness.state.status().await, ConnectionStatus::TerminalError);
    assert!(harness.presenter.saw_status("Giving up"));
}

#[tokio::test(start_paused = true)]
async fn given_silent_remote_when_connect_deadline_passes_then_attempt_times_out() {
    // GIVEN: A remote that never answers and a single allowed attempt
    let protocol = ScriptedProtocol::new(vec![vec![Step::Hold]]);
    let mut harness = Harness::new(protocol.clone());
    harness.connection.max_connection_attempts = 1;
    let mut manager = harness.headless_manager();

    // WHEN
    let result = manager.run().await;

    // THEN
    assert!(matches!(
        result,
        Err(CoreError::Connection(ConnectionError::CeilingExceeded { .. }))
    ));
    assert!(harness.presenter.saw_status("timed out"));
    assert!(protocol.control(0).is_closed());
}

/// A protocol whose `open` never resolves, like a bridge stuck before its
/// first handshake.
struct StalledProtocol {
    opens: AtomicU32,
}

#[async_trait]
impl SessionProtocol for StalledProtocol {
    async fn open(&self, _options: OpenOptions) -> Result<SocketHandle, ConnectionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        pending().await
    }
}

/// **VALUE**: The connect timeout also bounds the `open` call itself.
///
/// **WHY THIS MATTERS**: A headless worker has nobody to notice a hang. A
/// stalled open must turn into a timeout, a retry and finally the ceiling.
///
/// **BUG THIS CATCHES**: Would catch if the deadline is only armed after
/// `open` returns, leaving the manager parked forever.
#[tokio::test(start_paused = true)]
async fn given_open_never_resolves_when_connect_timeout_passes_then_attempt_times_out() {
    // GIVEN: A stalled protocol and a single allowed attempt
    let stalled = Arc::new(StalledProtocol {
        opens: AtomicU32::new(0),
    });
    let mut harness = Harness::new(ScriptedProtocol::new(Vec::new()));
    harness.connection.max_connection_attempts = 1;
    let connect_timeout = harness.connection.connect_timeout;
    let ctx = LifecycleContext {
        protocol: stalled.clone(),
        ..harness.context()
    };
    let mut manager = ConnectionManager::new(
        ctx,
        AuthMethodSelector::new(
            harness.store.clone(),
            SelectorMode::NonInteractive(AuthPreferences::default()),
        ),
    );
    let started = Instant::now();

    // WHEN
    let result = timeout(Duration::from_secs(3_600), manager.run())
        .await
        .expect("manager must not hang on a stalled open");

    // THEN: Timed out at the connect deadline, then hit the ceiling
    assert!(matches!(
        result,
        Err(CoreError::Connection(ConnectionError::CeilingExceeded { .. }))
    ));
    assert_eq!(stalled.opens.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= connect_timeout);
    assert!(harness.presenter.saw_status("timed out"));
}

/// Answers "1" (QR) to every question after a delay, like an operator
/// reading the menu.
struct DeliberatePrompter {
    asks: Arc<AtomicU32>,
    delay: Duration,
}

#[async_trait]
impl Prompter for DeliberatePrompter {
    async fn ask(&mut self, _question: &str) -> Result<Option<String>, AuthError> {
        self.asks.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay).await;
        Ok(Some("1".to_string()))
    }

    async fn say(&mut self, _line: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// **VALUE**: A restart requested while the menu is up is answered by the
/// method the operator then picks.
///
/// **BUG THIS CATCHES**: Would catch if the queued request is replayed
/// against the fresh socket, tearing it down and showing the menu again.
#[tokio::test(start_paused = true)]
async fn given_restart_while_menu_open_when_operator_chooses_then_new_attempt_survives() {
    // GIVEN: An operator who takes 5 s to answer
    let protocol = ScriptedProtocol::new(vec![vec![
        Step::Emit(SocketEvent::Qr("ref-1".into())),
        Step::Emit(identity_delta()),
        Step::Emit(SocketEvent::Open),
        Step::Hold,
    ]]);
    let harness = Harness::new(protocol.clone());
    let asks = Arc::new(AtomicU32::new(0));
    let mut manager = harness.manager(SelectorMode::Interactive(Box::new(DeliberatePrompter {
        asks: asks.clone(),
        delay: Duration::from_secs(5),
    })));
    let handle = harness.state.control_handle();
    let task = tokio::spawn(async move { manager.run().await });

    // WHEN: A restart arrives while the menu is up
    sleep(Duration::from_secs(1)).await;
    handle.restart(false).await.expect("manager is running");
    wait_for_status(&harness.state, ConnectionStatus::Connected).await;
    sleep(Duration::from_secs(1)).await;

    // THEN: One menu, one open, and the socket stays up
    assert_eq!(asks.load(Ordering::SeqCst), 1);
    assert_eq!(protocol.opens().len(), 1);
    assert!(!protocol.control(0).is_closed());
    assert!(handle.is_connected().await);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn given_bad_session_when_closed_then_wiped_and_reauthenticated_with_qr() {
    // GIVEN
    let protocol = ScriptedProtocol::new(vec![
        vec![Step::Emit(SocketEvent::Close(CloseCause::BadSession))],
        vec![Step::Emit(SocketEvent::Qr("ref".into())), Step::Hold],
    ]);
    let harness = Harness::new(protocol.clone());
    harness.persist_session().await;
    let mut manager = harness.headless_manager();

    // WHEN
    let task = tokio::spawn(async move { manager.run().await });
    wait_until("second open", || {
        let protocol = protocol.clone();
        async move { protocol.opens().len() == 2 }
    })
    .await;

    // THEN
    let opens = protocol.opens();
    assert_eq!(opens[0].method, AuthMethod::Reuse);
    assert_eq!(opens[1].method, AuthMethod::Qr);
    assert_eq!(opens[1].credentials, None);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn given_pairing_preference_when_socket_ready_then_code_shown_and_recorded() {
    // GIVEN
    let protocol = ScriptedProtocol::new(vec![vec![
        Step::Emit(SocketEvent::Connecting),
        Step::Emit(SocketEvent::PairingReady),
        Step::Hold,
    ]]);
    let harness = Harness::new(protocol.clone());
    let mut manager = harness.manager(SelectorMode::NonInteractive(AuthPreferences {
        preferred_method: Some(AuthMethod::Pairing),
        phone_number: Some("+1 415 555 1234".into()),
    }));

    // WHEN
    let task = tokio::spawn(async move { manager.run().await });
    let state = harness.state.clone();
    wait_until("pairing challenge", move || {
        let state = state.clone();
        async move { state.auth_challenge().await.is_some() }
    })
    .await;

    // THEN
    assert_eq!(
        harness.state.auth_challenge().await,
        Some(AuthChallenge::PairingCode {
            code: "ABCD-1234".into()
        })
    );
    assert_eq!(
        harness.presenter.pairing_codes.lock().unwrap().as_slice(),
        ["ABCD-1234".to_string()]
    );
    assert_eq!(protocol.opens()[0].method, AuthMethod::Pairing);

    task.abort();
}

/// **VALUE**: A failed pairing-code request is reported but leaves the socket
/// to decide the attempt's fate.
///
/// **BUG THIS CATCHES**: Tearing down the socket on a rate-limited code
/// request, which would burn a connection attempt for nothing.
#[tokio::test(start_paused = true)]
async fn given_pairing_request_fails_when_socket_stays_up_then_reported_and_not_closed() {
    // GIVEN
    let protocol = ScriptedProtocol::with_pairing(
        vec![vec![Step::Emit(SocketEvent::PairingReady), Step::Hold]],
        Err("rate limited".to_string()),
    );
    let harness = Harness::new(protocol.clone());
    let mut manager = harness.manager(SelectorMode::NonInteractive(AuthPreferences {
        preferred_method: Some(AuthMethod::Pairing),
        phone_number: Some("+14155551234".into()),
    }));

    // WHEN
    let task = tokio::spawn(async move { manager.run().await });
    let presenter = harness.presenter.clone();
    wait_until("pairing failure status", move || {
        let presenter = presenter.clone();
        async move { presenter.saw_status("Pairing code request failed") }
    })
    .await;

    // THEN
    assert!(!protocol.control(0).is_closed());
    assert_eq!(protocol.opens().len(), 1);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn given_connected_when_operator_restarts_then_socket_closed_and_reconnected() {
    // GIVEN
    let protocol = ScriptedProtocol::new(vec![
        vec![Step::Emit(SocketEvent::Open), Step::Hold],
        vec![Step::Emit(SocketEvent::Open), Step::Hold],
    ]);
    let harness = Harness::new(protocol.clone());
    harness.persist_session().await;
    let mut manager = harness.headless_manager();
    let handle = harness.state.control_handle();

    let task = tokio::spawn(async move { manager.run().await });
    wait_for_status(&harness.state, ConnectionStatus::Connected).await;

    // WHEN
    handle.restart(false).await.expect("manager is running");
    wait_until("second open", || {
        let protocol = protocol.clone();
        async move { protocol.opens().len() == 2 }
    })
    .await;
    wait_for_status(&harness.state, ConnectionStatus::Connected).await;

    // THEN
    assert!(protocol.control(0).is_closed());
    assert_eq!(protocol.opens()[1].method, AuthMethod::Reuse);
    assert!(handle.is_connected().await);

    task.abort();
}

#[tokio::test]
async fn given_operator_chooses_exit_when_no_session_then_user_exit() {
    // GIVEN
    struct ExitPrompter;

    #[async_trait]
    impl Prompter for ExitPrompter {
        async fn ask(&mut self, _question: &str) -> Result<Option<String>, AuthError> {
            Ok(Some("4".to_string()))
        }

        async fn say(&mut self, _line: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    let protocol = ScriptedProtocol::new(Vec::new());
    let harness = Harness::new(protocol.clone());
    let mut manager = harness.manager(SelectorMode::Interactive(Box::new(ExitPrompter)));

    // WHEN
    let result = manager.run().await;

    // THEN
    assert!(matches!(result, Ok(LifecycleExit::UserExit)));
    assert!(protocol.opens().is_empty());
}
