//! Boundary with the external session-protocol implementation.
//!
//! The cryptographic handshake lives outside this crate. What it must offer
//! is captured by [`SessionProtocol`]: open a socket for an auth method and
//! report what happens on it as a stream of [`SocketEvent`]s.

pub mod bridge;

pub use bridge::BridgeProtocol;

use crate::error::connection::ConnectionError;
use crate::session_store::CredentialDelta;

use models::{AuthMethod, CloseCause};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Everything the protocol needs to open one socket.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub attempt_id: Uuid,
    pub method: AuthMethod,
    /// The persisted bundle, if any.
    pub credentials: Option<Value>,
    pub connect_timeout: Duration,
}

/// What a socket reports, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    CredentialsUpdated(CredentialDelta),
    /// A fresh QR payload; refreshes arrive as further events.
    Qr(String),
    /// The socket can accept a pairing-code request.
    PairingReady,
    Connecting,
    Open,
    Close(CloseCause),
}

/// Commands a live socket accepts.
#[async_trait]
pub trait SocketControl: Send + Sync {
    async fn request_pairing_code(&self, normalized_phone: &str) -> Result<String, ConnectionError>;

    /// Best-effort teardown. Idempotent.
    async fn close(&self);
}

/// A socket: its event stream plus a control handle.
pub struct SocketHandle {
    pub events: mpsc::Receiver<SocketEvent>,
    pub control: Arc<dyn SocketControl>,
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SessionProtocol: Send + Sync {
    async fn open(&self, options: OpenOptions) -> Result<SocketHandle, ConnectionError>;
}
