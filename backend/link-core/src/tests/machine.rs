// Unit tests for the per-attempt state machine

use crate::connection::{AttemptEffect, AttemptEnd, AttemptInput, AttemptMachine, AttemptPhase, TimeoutKind};
use crate::protocol::SocketEvent;
use crate::session_store::CredentialDelta;

use models::{AuthMethod, CloseCause};

use std::time::Duration;

use serde_json::json;

const CONNECT: Duration = Duration::from_secs(20);
const WINDOW: Duration = Duration::from_secs(60);

fn machine(method: AuthMethod) -> AttemptMachine {
    AttemptMachine::new(method, CONNECT, WINDOW)
}

fn socket(event: SocketEvent) -> AttemptInput {
    AttemptInput::Socket(event)
}

#[test]
fn given_new_attempt_when_started_then_arms_connect_deadline() {
    let mut machine = machine(AuthMethod::Reuse);

    assert_eq!(
        machine.start(),
        vec![AttemptEffect::ArmDeadline {
            kind: TimeoutKind::Connect,
            after: CONNECT,
        }]
    );
    assert_eq!(machine.phase(), AttemptPhase::Opening);
}

/// **VALUE**: Every QR refresh is shown with a growing index, and only the
/// first one switches to the auth window.
///
/// **BUG THIS CATCHES**: Re-arming the window on each refresh, which would let
/// an unscanned QR loop forever.
#[test]
fn given_qr_attempt_when_payloads_refresh_then_each_is_shown_and_window_armed_once() {
    // GIVEN
    let mut machine = machine(AuthMethod::Qr);
    machine.start();

    // WHEN
    let first = machine.handle(socket(SocketEvent::Qr("ref-1".into())));
    let second = machine.handle(socket(SocketEvent::Qr("ref-2".into())));

    // THEN
    assert_eq!(
        first,
        vec![
            AttemptEffect::ArmDeadline {
                kind: TimeoutKind::AuthWindow,
                after: WINDOW,
            },
            AttemptEffect::ShowQr {
                payload: "ref-1".into(),
                refresh_index: 1,
            },
        ]
    );
    assert_eq!(
        second,
        vec![AttemptEffect::ShowQr {
            payload: "ref-2".into(),
            refresh_index: 2,
        }]
    );
    assert_eq!(machine.qr_refreshes(), 2);
    assert_eq!(machine.phase(), AttemptPhase::Authenticating);
}

#[test]
fn given_pairing_attempt_when_qr_and_ready_arrive_then_code_requested_once_and_qr_hidden() {
    let mut machine = machine(AuthMethod::Pairing);
    machine.start();

    let on_qr = machine.handle(socket(SocketEvent::Qr("ref-1".into())));
    let on_ready = machine.handle(socket(SocketEvent::PairingReady));
    let on_second_qr = machine.handle(socket(SocketEvent::Qr("ref-2".into())));

    assert!(on_qr.contains(&AttemptEffect::RequestPairingCode));
    assert!(
        !on_qr
            .iter()
            .any(|effect| matches!(effect, AttemptEffect::ShowQr { .. }))
    );
    assert!(on_ready.is_empty());
    assert!(on_second_qr.is_empty());
}

#[test]
fn given_authenticating_when_open_then_disarms_and_marks_connected() {
    let mut machine = machine(AuthMethod::Qr);
    machine.start();
    machine.handle(socket(SocketEvent::Qr("ref".into())));

    let effects = machine.handle(socket(SocketEvent::Open));

    assert_eq!(
        effects,
        vec![AttemptEffect::DisarmDeadline, AttemptEffect::MarkConnected]
    );
    assert_eq!(machine.phase(), AttemptPhase::Open);
    assert!(machine.was_open());
}

#[test]
fn given_any_phase_when_credentials_update_then_persisted() {
    let delta = CredentialDelta(json!({"me": {"id": "123@s.example"}}));
    let mut machine = machine(AuthMethod::Qr);
    machine.start();

    let opening = machine.handle(socket(SocketEvent::CredentialsUpdated(delta.clone())));
    machine.handle(socket(SocketEvent::Open));
    let open = machine.handle(socket(SocketEvent::CredentialsUpdated(delta.clone())));

    assert_eq!(opening, vec![AttemptEffect::PersistCredentials(delta.clone())]);
    assert_eq!(open, vec![AttemptEffect::PersistCredentials(delta)]);
}

/// **VALUE**: Close handling is idempotent.
///
/// **WHY THIS MATTERS**: Protocol libraries can emit several close signals for
/// one teardown. Acting on each would schedule overlapping reconnects.
#[test]
fn given_finished_attempt_when_more_events_arrive_then_ignored() {
    let mut machine = machine(AuthMethod::Reuse);
    machine.start();

    let first = machine.handle(socket(SocketEvent::Close(CloseCause::ConnectionLost)));
    let second = machine.handle(socket(SocketEvent::Close(CloseCause::LoggedOut)));
    let late_timer = machine.handle(AttemptInput::DeadlineElapsed);

    assert_eq!(
        first,
        vec![
            AttemptEffect::DisarmDeadline,
            AttemptEffect::Finish(AttemptEnd::Closed(CloseCause::ConnectionLost)),
        ]
    );
    assert!(second.is_empty());
    assert!(late_timer.is_empty());
    assert_eq!(machine.phase(), AttemptPhase::Finished);
}

#[test]
fn given_no_auth_activity_when_deadline_elapses_then_connect_timeout() {
    let mut machine = machine(AuthMethod::Reuse);
    machine.start();
    machine.handle(socket(SocketEvent::Connecting));

    let effects = machine.handle(AttemptInput::DeadlineElapsed);

    assert_eq!(
        effects.last(),
        Some(&AttemptEffect::Finish(AttemptEnd::TimedOut(TimeoutKind::Connect)))
    );
}

#[test]
fn given_qr_shown_when_deadline_elapses_then_auth_window_timeout() {
    let mut machine = machine(AuthMethod::Qr);
    machine.start();
    machine.handle(socket(SocketEvent::Qr("ref".into())));

    let effects = machine.handle(AttemptInput::DeadlineElapsed);

    assert_eq!(
        effects.last(),
        Some(&AttemptEffect::Finish(AttemptEnd::TimedOut(TimeoutKind::AuthWindow)))
    );
}

#[test]
fn given_open_socket_when_closed_then_reports_was_open() {
    let mut machine = machine(AuthMethod::Reuse);
    machine.start();
    machine.handle(socket(SocketEvent::Open));

    let effects = machine.handle(socket(SocketEvent::Close(CloseCause::RestartRequired)));

    assert!(machine.was_open());
    assert_eq!(
        effects.last(),
        Some(&AttemptEffect::Finish(AttemptEnd::Closed(CloseCause::RestartRequired)))
    );
}
