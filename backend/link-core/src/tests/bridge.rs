use crate::error::ConnectionError;
use crate::protocol::SocketControl;
use crate::protocol::bridge::BridgeControl;

/// **VALUE**: A pairing request that never reached the bridge leaves no
/// waiter behind.
///
/// **BUG THIS CATCHES**: Would catch if the pending table keeps the oneshot
/// for a request whose stdin write failed, so every failed request leaks an
/// entry for the lifetime of the socket.
#[tokio::test]
async fn given_closed_bridge_when_requesting_pairing_code_then_no_request_stays_pending() {
    // GIVEN: A control whose bridge stdin is gone
    let control = BridgeControl::detached();

    // WHEN: Requesting a code twice
    let first = control.request_pairing_code("+14155551234").await;
    let second = control.request_pairing_code("+14155551234").await;

    // THEN: Both fail and nothing is left waiting
    assert!(matches!(first, Err(ConnectionError::PairingCode { .. })));
    assert!(matches!(second, Err(ConnectionError::PairingCode { .. })));
    assert_eq!(control.pending_requests(), 0);
}
