// Unit tests for the runtime state actor and control handle

use crate::error::StateError;
use crate::runtime::{AuthChallenge, RestartRequest, RuntimeState, StateCommand};

use models::ConnectionStatus;

use tokio::sync::mpsc;

#[tokio::test]
async fn given_fresh_state_when_read_then_uninitialized_and_disconnected() {
    let state = RuntimeState::new();

    let snapshot = state.snapshot().await;

    assert_eq!(snapshot.status, ConnectionStatus::Uninitialized);
    assert!(!snapshot.is_connected());
    assert_eq!(snapshot.budget.connection_attempts, 0);
}

/// **VALUE**: A successful open sets `Connected` and zeroes the attempt
/// counter in one step.
///
/// **WHY THIS MATTERS**: The dashboard must never see `Connected` next to a
/// counter that still says the bot is about to give up.
///
/// **BUG THIS CATCHES**: Splitting the status and the reset into two commands.
#[tokio::test]
async fn given_attempts_in_flight_when_marked_connected_then_status_and_counter_change_together() {
    // GIVEN
    let state = RuntimeState::new();
    state.update(StateCommand::BeginConnectionAttempt).await.unwrap();
    state.update(StateCommand::BeginConnectionAttempt).await.unwrap();
    state
        .update(StateCommand::SetAuthChallenge(Some(AuthChallenge::Qr {
            payload: "ref".into(),
            refresh_index: 1,
        })))
        .await
        .unwrap();
    assert_eq!(state.retry_budget().await.connection_attempts, 2);

    // WHEN
    state.update(StateCommand::MarkConnected).await.unwrap();

    // THEN
    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.status, ConnectionStatus::Connected);
    assert_eq!(snapshot.budget.connection_attempts, 0);
    assert_eq!(snapshot.challenge, None);
}

#[tokio::test]
async fn given_restarts_recorded_when_attempts_reset_then_restart_counter_kept() {
    let state = RuntimeState::new();
    state.update(StateCommand::RecordRestart).await.unwrap();
    state.update(StateCommand::BeginConnectionAttempt).await.unwrap();

    state
        .update(StateCommand::ResetConnectionAttempts)
        .await
        .unwrap();

    let budget = state.retry_budget().await;
    assert_eq!(budget.connection_attempts, 0);
    assert_eq!(budget.restart_attempts, 1);
}

#[tokio::test]
async fn given_no_manager_when_restart_requested_then_no_manager_error() {
    let handle = RuntimeState::new().control_handle();

    let result = handle.restart(false).await;

    assert!(matches!(result, Err(StateError::NoManager { .. })));
}

#[tokio::test]
async fn given_attached_manager_when_restart_requested_then_request_delivered() {
    // GIVEN
    let state = RuntimeState::new();
    let (tx, mut rx) = mpsc::channel(1);
    state.update(StateCommand::AttachManager(tx)).await.unwrap();

    // WHEN
    state.control_handle().restart(true).await.unwrap();

    // THEN
    assert_eq!(
        rx.recv().await,
        Some(RestartRequest {
            clear_session: true
        })
    );
}

#[tokio::test]
async fn given_handle_when_status_changes_then_handle_sees_it() {
    let state = RuntimeState::new();
    let handle = state.control_handle();

    state
        .update(StateCommand::SetStatus(ConnectionStatus::Reconnecting))
        .await
        .unwrap();

    assert_eq!(handle.connection_status().await, ConnectionStatus::Reconnecting);
    assert!(!handle.is_connected().await);
}
