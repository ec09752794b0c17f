//! The lifecycle loop: authenticate, connect, classify the close, repeat.

use crate::auth::AuthMethodSelector;
use crate::connection::LifecycleContext;
use crate::connection::classify::classify;
use crate::connection::reconnect::ReconnectPolicy;
use crate::connection::session::{ConnectionSession, SessionOutcome};
use crate::error::CoreError;
use crate::error::connection::ConnectionError;
use crate::runtime::{RestartRequest, StateCommand};

use common::ErrorLocation;
use models::{AuthAttempt, AuthMethod, CloseCause, ConnectionStatus, DisconnectAction};

use std::panic::Location;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

const RESTART_CHANNEL_CAPACITY: usize = 8;

/// Why the manager stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleExit {
    /// The operator chose to exit.
    UserExit,
}

enum NextStep {
    /// Use the persisted session if there is one, the selector otherwise.
    Authenticate,
    /// Skip the persisted session and go straight to the selector.
    Reauthenticate,
    /// Try again after a transient close.
    Retry(AuthAttempt),
}

pub struct ConnectionManager {
    ctx: LifecycleContext,
    selector: AuthMethodSelector,
    policy: ReconnectPolicy,
    session: ConnectionSession,
}

impl ConnectionManager {
    pub fn new(ctx: LifecycleContext, selector: AuthMethodSelector) -> Self {
        let policy = ReconnectPolicy::from_config(&ctx.connection);
        let session = ConnectionSession::new(ctx.clone());
        Self {
            ctx,
            selector,
            policy,
            session,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Drive the lifecycle until the operator exits or an error escalates.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::CeilingExceeded`] once the connection ceiling is used up
    /// - Selector failures such as an invalid headless pairing setup
    /// - Session store failures that the loop cannot absorb
    pub async fn run(&mut self) -> Result<LifecycleExit, CoreError> {
        let (restart_tx, mut restart_rx) = mpsc::channel(RESTART_CHANNEL_CAPACITY);
        self.ctx
            .state
            .update(StateCommand::AttachManager(restart_tx))
            .await?;

        let result = self.run_loop(&mut restart_rx).await;

        if let Err(e) = self.ctx.state.update(StateCommand::DetachManager).await {
            warn!("Failed to detach connection manager: {e}");
        }
        if let Err(e) = &result {
            error!("Connection manager stopped: {e}");
            if let Err(e) = self
                .ctx
                .state
                .update(StateCommand::SetStatus(ConnectionStatus::TerminalError))
                .await
            {
                warn!("Failed to record terminal status: {e}");
            }
        }

        result
    }

    async fn run_loop(
        &mut self,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<LifecycleExit, CoreError> {
        self.ctx.store.ensure_directory().await?;
        let mut next = NextStep::Authenticate;

        loop {
            let attempt = match next {
                NextStep::Authenticate => self.authenticate(false, restart_rx).await?,
                NextStep::Reauthenticate => self.authenticate(true, restart_rx).await?,
                NextStep::Retry(previous) => self.retry_attempt(previous, restart_rx).await?,
            };

            let Some(attempt) = attempt else {
                info!("Operator exit requested");
                self.ctx.presenter.status("Exiting");
                self.ctx
                    .state
                    .update(StateCommand::SetStatus(ConnectionStatus::Disconnected))
                    .await?;
                return Ok(LifecycleExit::UserExit);
            };

            let budget = self.ctx.state.retry_budget().await;
            if let Err(e) = self.policy.check_ceiling(&budget) {
                self.report_ceiling(&e);
                return Err(e.into());
            }

            let outcome = self.session.run(&attempt, restart_rx).await?;
            next = self.after_outcome(outcome, attempt, restart_rx).await?;
        }
    }

    /// `None` means the operator chose to exit.
    async fn authenticate(
        &mut self,
        force: bool,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<Option<AuthAttempt>, CoreError> {
        if !force && self.ctx.store.has_session().await {
            info!("Reusing persisted session");
            return Ok(Some(AuthAttempt::reuse()));
        }

        self.ctx
            .state
            .update(StateCommand::SetStatus(ConnectionStatus::AwaitingAuth))
            .await?;

        let attempt = self.selector.select().await?;
        self.discard_pending_restarts(restart_rx).await?;
        match attempt.method() {
            AuthMethod::Exit => Ok(None),
            _ => Ok(Some(attempt)),
        }
    }

    async fn retry_attempt(
        &mut self,
        previous: AuthAttempt,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<Option<AuthAttempt>, CoreError> {
        if self.ctx.store.has_session().await {
            return Ok(Some(AuthAttempt::reuse()));
        }
        if previous.method() == AuthMethod::Reuse {
            debug!("Persisted session vanished before retry; asking for a method");
            return self.authenticate(true, restart_rx).await;
        }
        Ok(Some(previous))
    }

    async fn after_outcome(
        &mut self,
        outcome: SessionOutcome,
        attempt: AuthAttempt,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<NextStep, CoreError> {
        match outcome {
            SessionOutcome::RestartRequested(request) => self.restart(request).await,
            SessionOutcome::TimedOut(kind) => {
                let timeout = ConnectionError::ConnectTimeout {
                    message: format!("{kind} elapsed with method {}", attempt.method()),
                    location: ErrorLocation::from(Location::caller()),
                };
                warn!("{timeout}");
                self.ctx
                    .presenter
                    .status(&format!("Connection attempt timed out ({kind})"));
                self.backoff(attempt, restart_rx).await
            }
            SessionOutcome::Closed {
                cause,
                was_connected,
            } => {
                if was_connected {
                    info!("Live connection dropped: {cause}");
                }
                self.on_close(cause, attempt, restart_rx).await
            }
        }
    }

    async fn on_close(
        &mut self,
        cause: CloseCause,
        attempt: AuthAttempt,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<NextStep, CoreError> {
        match classify(&cause) {
            DisconnectAction::Retry => {
                if !cause.is_recognized() {
                    warn!("Retrying after unrecognized close cause: {cause}");
                }
                self.ctx
                    .presenter
                    .status(&format!("Connection closed ({cause})"));
                self.backoff(attempt, restart_rx).await
            }
            DisconnectAction::WipeAndReauth => {
                warn!("Session rejected ({cause}); clearing credentials");
                self.ctx.store.clear().await?;
                self.ctx
                    .presenter
                    .status("Stored session is no longer valid; authenticate again");
                Ok(NextStep::Reauthenticate)
            }
            DisconnectAction::Terminal => {
                warn!("Session ended by the remote side ({cause})");
                self.ctx.store.clear().await?;
                self.ctx
                    .presenter
                    .status("Session expired; authenticate again to continue");
                self.ctx
                    .state
                    .update(StateCommand::SetStatus(ConnectionStatus::AwaitingAuth))
                    .await?;
                Ok(NextStep::Reauthenticate)
            }
        }
    }

    async fn backoff(
        &mut self,
        attempt: AuthAttempt,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<NextStep, CoreError> {
        let budget = self.ctx.state.retry_budget().await;
        let delay = match self.policy.schedule(&budget) {
            Ok(delay) => delay,
            Err(e) => {
                self.report_ceiling(&e);
                return Err(e.into());
            }
        };

        self.ctx
            .state
            .update(StateCommand::SetStatus(ConnectionStatus::Reconnecting))
            .await?;
        info!(
            "Reconnecting in {} ms (attempt {} of {})",
            delay.as_millis(),
            budget.connection_attempts + 1,
            self.policy.ceiling()
        );
        self.ctx
            .presenter
            .status(&format!("Reconnecting in {:.1}s", delay.as_secs_f64()));

        tokio::select! {
            _ = sleep(delay) => Ok(NextStep::Retry(attempt)),
            Some(request) = restart_rx.recv() => self.restart(request).await,
        }
    }

    /// Restarts requested while the operator was choosing a method are
    /// answered by the attempt they just chose.
    async fn discard_pending_restarts(
        &self,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<(), CoreError> {
        let mut discarded = 0usize;
        while let Ok(request) = restart_rx.try_recv() {
            debug!(
                "Restart request (clear_session: {}) superseded by the new auth choice",
                request.clear_session
            );
            discarded += 1;
        }

        if discarded > 0 {
            info!("Folded {discarded} pending restart request(s) into the new attempt");
            self.ctx
                .state
                .update(StateCommand::ResetConnectionAttempts)
                .await?;
        }
        Ok(())
    }

    async fn restart(&mut self, request: RestartRequest) -> Result<NextStep, CoreError> {
        info!(
            "Restarting connection on operator request (clear_session: {})",
            request.clear_session
        );
        if request.clear_session {
            self.ctx.store.clear().await?;
        }
        self.ctx
            .state
            .update(StateCommand::ResetConnectionAttempts)
            .await?;
        self.ctx.presenter.status("Restarting connection");
        Ok(NextStep::Authenticate)
    }

    fn report_ceiling(&self, e: &ConnectionError) {
        error!("{e}");
        self.ctx.presenter.status(&format!(
            "Giving up after {} connection attempts",
            self.policy.ceiling()
        ));
    }
}
