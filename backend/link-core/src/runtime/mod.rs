//! Process-wide runtime state.
//!
//! Holds the connection status, the retry budget and the latest auth
//! challenge for the dashboard and dispatch collaborators.
//!
//! # Architecture
//!
//! Mutations go through a single actor task:
//! - Commands are sent over an mpsc channel together with an acknowledgement
//! - The actor applies them one at a time and acknowledges each
//! - Reads take a snapshot under `Arc<RwLock<T>>`
//!
//! Every command touches one field group in one write, so a reader never
//! sees `Connected` next to a stale attempt counter.

pub mod handle;

pub use handle::ControlHandle;

use crate::error::state::StateError;

use common::ErrorLocation;
use models::{ConnectionStatus, RetryBudget};

use std::panic::Location;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};

const STATE_CHANNEL_CAPACITY: usize = 100;

/// The challenge an operator has to answer to finish authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthChallenge {
    Qr { payload: String, refresh_index: u32 },
    PairingCode { code: String },
}

/// An operator request to tear down the live attempt and start over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest {
    /// Wipe the persisted session before reconnecting.
    pub clear_session: bool,
}

/// Commands that mutate runtime state.
#[derive(Debug, Clone)]
pub enum StateCommand {
    SetStatus(ConnectionStatus),

    /// Count one socket open and move to `Connecting`.
    BeginConnectionAttempt,

    /// Socket opened: `Connected`, attempts back to zero, challenge cleared.
    MarkConnected,

    ResetConnectionAttempts,

    RecordRestart,

    SetAuthChallenge(Option<AuthChallenge>),

    /// Register the restart channel of the manager currently running.
    AttachManager(mpsc::Sender<RestartRequest>),

    DetachManager,
}

/// Read-only copy of the runtime state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeSnapshot {
    pub status: ConnectionStatus,
    pub budget: RetryBudget,
    pub challenge: Option<AuthChallenge>,
}

impl RuntimeSnapshot {
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

#[derive(Debug, Default)]
struct RuntimeInner {
    snapshot: RuntimeSnapshot,
    restart_tx: Option<mpsc::Sender<RestartRequest>>,
}

type Acknowledged = (StateCommand, oneshot::Sender<()>);

/// Shared runtime state. Clones share the same actor and storage.
#[derive(Clone)]
pub struct RuntimeState {
    command_tx: Arc<Mutex<Option<mpsc::Sender<Acknowledged>>>>,
    inner: Arc<RwLock<RuntimeInner>>,
}

impl RuntimeState {
    /// The actor is spawned lazily on the first update.
    pub fn new() -> Self {
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            inner: Arc::new(RwLock::new(RuntimeInner::default())),
        }
    }

    /// Apply a command and wait until the actor has done so.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Actor`] if the actor task is gone.
    pub async fn update(&self, cmd: StateCommand) -> Result<(), StateError> {
        let tx = self.ensure_actor().await;
        let (ack_tx, ack_rx) = oneshot::channel();

        tx.send((cmd, ack_tx)).await.map_err(|e| StateError::Actor {
            message: format!("State actor died: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        ack_rx.await.map_err(|_| StateError::Actor {
            message: "State actor dropped the acknowledgement".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub async fn snapshot(&self) -> RuntimeSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.inner.read().await.snapshot.status
    }

    pub async fn is_connected(&self) -> bool {
        self.status().await.is_connected()
    }

    pub async fn retry_budget(&self) -> RetryBudget {
        self.inner.read().await.snapshot.budget
    }

    pub async fn auth_challenge(&self) -> Option<AuthChallenge> {
        self.inner.read().await.snapshot.challenge.clone()
    }

    /// A handle for collaborators outside the lifecycle loop.
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle::new(self.clone())
    }

    pub(crate) async fn restart_sender(&self) -> Option<mpsc::Sender<RestartRequest>> {
        self.inner.read().await.restart_tx.clone()
    }

    async fn ensure_actor(&self) -> mpsc::Sender<Acknowledged> {
        let mut tx_guard = self.command_tx.lock().await;
        if let Some(tx) = tx_guard.as_ref() {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(STATE_CHANNEL_CAPACITY);
        *tx_guard = Some(tx.clone());
        drop(tx_guard);

        tokio::spawn(state_actor(rx, Arc::clone(&self.inner)));
        info!("Runtime state actor spawned");
        tx
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

async fn state_actor(mut command_rx: mpsc::Receiver<Acknowledged>, inner: Arc<RwLock<RuntimeInner>>) {
    debug!("Runtime state actor started");

    while let Some((cmd, ack)) = command_rx.recv().await {
        {
            let mut state = inner.write().await;
            apply(&mut state, cmd);
        }
        let _ = ack.send(());
    }

    debug!("Runtime state actor stopped");
}

fn apply(state: &mut RuntimeInner, cmd: StateCommand) {
    let snapshot = &mut state.snapshot;

    match cmd {
        StateCommand::SetStatus(status) => {
            if snapshot.status != status {
                info!("Connection status: {} -> {}", snapshot.status, status);
            }
            snapshot.status = status;
        }
        StateCommand::BeginConnectionAttempt => {
            let attempt = snapshot.budget.begin_connection_attempt();
            snapshot.status = ConnectionStatus::Connecting;
            debug!("Connection attempt {attempt} started");
        }
        StateCommand::MarkConnected => {
            snapshot.status = ConnectionStatus::Connected;
            snapshot.budget.reset_connection_attempts();
            snapshot.challenge = None;
            info!("Connection status: connected");
        }
        StateCommand::ResetConnectionAttempts => {
            snapshot.budget.reset_connection_attempts();
        }
        StateCommand::RecordRestart => {
            let restarts = snapshot.budget.record_restart();
            warn!("In-process restart {restarts} recorded");
        }
        StateCommand::SetAuthChallenge(challenge) => {
            snapshot.challenge = challenge;
        }
        StateCommand::AttachManager(tx) => {
            if state.restart_tx.replace(tx).is_some() {
                debug!("Replaced restart channel of previous manager");
            }
        }
        StateCommand::DetachManager => {
            state.restart_tx = None;
        }
    }
}
