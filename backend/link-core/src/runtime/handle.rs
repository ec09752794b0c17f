//! Handle given to the dashboard collaborator.

use crate::error::state::StateError;
use crate::runtime::{AuthChallenge, RestartRequest, RuntimeState};

use common::ErrorLocation;
use models::{ConnectionStatus, RetryBudget};

use std::panic::Location;

use log::info;

/// Read status and request restarts without touching the lifecycle loop.
///
/// Cheap to clone; every clone sees the same [`RuntimeState`].
#[derive(Clone)]
pub struct ControlHandle {
    state: RuntimeState,
}

impl ControlHandle {
    pub(crate) fn new(state: RuntimeState) -> Self {
        Self { state }
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.state.status().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state.is_connected().await
    }

    pub async fn retry_budget(&self) -> RetryBudget {
        self.state.retry_budget().await
    }

    /// The QR payload or pairing code waiting to be answered, if any.
    pub async fn auth_challenge(&self) -> Option<AuthChallenge> {
        self.state.auth_challenge().await
    }

    /// Ask the running manager to drop the current attempt and reconnect.
    ///
    /// With `clear_session` the persisted session is wiped first, which
    /// forces a fresh authentication.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NoManager`] when no manager is running.
    pub async fn restart(&self, clear_session: bool) -> Result<(), StateError> {
        let tx = self
            .state
            .restart_sender()
            .await
            .ok_or_else(|| StateError::NoManager {
                message: "No connection manager is running".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        tx.send(RestartRequest { clear_session })
            .await
            .map_err(|_| StateError::NoManager {
                message: "Connection manager stopped before the restart request".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Restart requested (clear_session: {clear_session})");
        Ok(())
    }
}
