//! Bridge protocol against a shell script standing in for the bridge process.

use link_core::protocol::{BridgeProtocol, OpenOptions, SessionProtocol, SocketEvent};
use link_core::session_store::CredentialDelta;

use models::{AuthMethod, CloseCause};

use std::fs;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

const SCRIPT: &str = r#"#!/bin/sh
read open_request
echo "bridge booting"
echo '{"type":"qr","payload":"ref-1"}'
echo '{"type":"creds_update","delta":{"me":{"id":"1@s.example"}}}'
echo '{"type":"open"}'
read pairing_request
id=$(echo "$pairing_request" | sed 's/.*"request_id":"\([^"]*\)".*/\1/')
echo "{\"type\":\"pairing_code\",\"request_id\":\"$id\",\"code\":\"ABCD1234\"}"
echo '{"type":"close","reason":"connectionLost","status_code":408}'
"#;

async fn next_event(events: &mut mpsc::Receiver<SocketEvent>) -> Option<SocketEvent> {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("bridge event timed out")
}

fn write_script(dir: &TempDir) -> String {
    let path = dir.path().join("bridge.sh");
    fs::write(&path, SCRIPT).expect("Failed to write bridge script");
    format!("sh {}", path.display())
}

#[test]
fn given_empty_command_when_parsed_then_rejected() {
    assert!(BridgeProtocol::from_command_line("   ").is_err());
    assert_eq!(
        BridgeProtocol::from_command_line("node bridge.js --verbose")
            .unwrap()
            .program(),
        "node"
    );
}

/// **VALUE**: Exercises the full newline-delimited JSON exchange with a real
/// child process.
///
/// **WHY THIS MATTERS**: The bridge is the only way events reach the lifecycle
/// in production. A framing or tagging mistake silently drops every event.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Event tags do not match the wire names
/// - Non-JSON output kills the reader
/// - Pairing responses are not matched back to their request
/// - Stdout EOF does not end the event stream
#[cfg(unix)]
#[tokio::test]
async fn given_bridge_script_when_opened_then_events_and_pairing_round_trip() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let protocol = BridgeProtocol::from_command_line(&write_script(&dir)).unwrap();

    // WHEN
    let mut socket = protocol
        .open(OpenOptions {
            attempt_id: Uuid::new_v4(),
            method: AuthMethod::Qr,
            credentials: None,
            connect_timeout: Duration::from_secs(20),
        })
        .await
        .expect("Failed to open bridge");

    // THEN
    assert_eq!(next_event(&mut socket.events).await, Some(SocketEvent::Qr("ref-1".into())));
    assert_eq!(
        next_event(&mut socket.events).await,
        Some(SocketEvent::CredentialsUpdated(CredentialDelta(
            json!({"me": {"id": "1@s.example"}})
        )))
    );
    assert_eq!(next_event(&mut socket.events).await, Some(SocketEvent::Open));

    let code = socket
        .control
        .request_pairing_code("+14155551234")
        .await
        .expect("pairing code");
    assert_eq!(code, "ABCD1234");

    assert_eq!(
        next_event(&mut socket.events).await,
        Some(SocketEvent::Close(CloseCause::ConnectionLost))
    );
    assert_eq!(next_event(&mut socket.events).await, None);

    socket.control.close().await;
}
