//! Driver for one connection attempt.
//!
//! One task owns the socket's event receiver, the armed deadline and the
//! restart channel, and feeds every input through [`AttemptMachine`] in
//! arrival order.

use crate::connection::LifecycleContext;
use crate::connection::dispatch::LiveSocket;
use crate::connection::machine::{AttemptEffect, AttemptEnd, AttemptInput, AttemptMachine, TimeoutKind};
use crate::error::CoreError;
use crate::protocol::{OpenOptions, SocketControl, SocketEvent};
use crate::runtime::{AuthChallenge, RestartRequest, StateCommand};

use models::{AuthAttempt, AuthMethod, CloseCause};

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Sleep, sleep, timeout};
use uuid::Uuid;

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Closed {
        cause: CloseCause,
        /// The socket reached `Open` before it closed.
        was_connected: bool,
    },
    TimedOut(TimeoutKind),
    RestartRequested(RestartRequest),
}

pub struct ConnectionSession {
    ctx: LifecycleContext,
}

impl ConnectionSession {
    pub fn new(ctx: LifecycleContext) -> Self {
        Self { ctx }
    }

    /// Run one attempt until it closes, times out or a restart is requested.
    ///
    /// # Errors
    ///
    /// Fails when a credential update cannot be persisted or the runtime
    /// state actor is gone. The socket is closed before the error returns.
    pub async fn run(
        &self,
        attempt: &AuthAttempt,
        restart_rx: &mut mpsc::Receiver<RestartRequest>,
    ) -> Result<SessionOutcome, CoreError> {
        let credentials = self.load_credentials(attempt.method()).await;
        let attempt_id = Uuid::new_v4();

        self.ctx
            .state
            .update(StateCommand::BeginConnectionAttempt)
            .await?;
        info!("Opening socket (attempt {attempt_id}, method {})", attempt.method());

        let options = OpenOptions {
            attempt_id,
            method: attempt.method(),
            credentials,
            connect_timeout: self.ctx.connection.connect_timeout,
        };

        let connect_timeout = self.ctx.connection.connect_timeout;
        let opened = match timeout(connect_timeout, self.ctx.protocol.open(options)).await {
            Ok(opened) => opened,
            Err(_) => {
                warn!("Socket for attempt {attempt_id} did not open within {connect_timeout:?}");
                return Ok(SessionOutcome::TimedOut(TimeoutKind::Connect));
            }
        };

        let mut socket = match opened {
            Ok(socket) => socket,
            Err(e) => {
                error!("Failed to open socket: {e}");
                self.ctx.presenter.status("Could not open the connection");
                return Ok(SessionOutcome::Closed {
                    cause: CloseCause::Unknown {
                        status_code: None,
                        reason: format!("open failed: {e}"),
                    },
                    was_connected: false,
                });
            }
        };

        let mut driver = AttemptDriver {
            ctx: &self.ctx,
            attempt,
            attempt_id,
            control: Arc::clone(&socket.control),
            machine: AttemptMachine::new(
                attempt.method(),
                self.ctx.connection.connect_timeout,
                self.ctx.connection.auth_window,
            ),
            deadline: None,
            pairing_task: None,
        };

        let start = driver.machine.start();
        let result = match driver.apply(start).await {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => loop {
                let input = tokio::select! {
                    event = socket.events.recv() => AttemptInput::Socket(
                        event.unwrap_or(SocketEvent::Close(CloseCause::ConnectionLost)),
                    ),
                    _ = wait_deadline(&mut driver.deadline) => AttemptInput::DeadlineElapsed,
                    Some(request) = restart_rx.recv() => {
                        info!("Restart requested during attempt {attempt_id}");
                        break Ok(SessionOutcome::RestartRequested(request));
                    }
                };

                let effects = driver.machine.handle(input);
                match driver.apply(effects).await {
                    Ok(Some(outcome)) => break Ok(outcome),
                    Ok(None) => {}
                    Err(e) => break Err(e),
                }
            },
            Err(e) => Err(e),
        };

        driver.shutdown().await;
        result
    }

    async fn load_credentials(&self, method: AuthMethod) -> Option<Value> {
        match self.ctx.store.load_credentials().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Ignoring unreadable credentials for {method} attempt: {e}");
                if let Err(e) = self.ctx.store.clear().await {
                    warn!("Failed to clear unreadable credentials: {e}");
                }
                None
            }
        }
    }
}

struct AttemptDriver<'a> {
    ctx: &'a LifecycleContext,
    attempt: &'a AuthAttempt,
    attempt_id: Uuid,
    control: Arc<dyn SocketControl>,
    machine: AttemptMachine,
    deadline: Option<Pin<Box<Sleep>>>,
    pairing_task: Option<JoinHandle<()>>,
}

impl AttemptDriver<'_> {
    /// Carry out effects in order. Returns the outcome once the attempt ends.
    async fn apply(
        &mut self,
        effects: Vec<AttemptEffect>,
    ) -> Result<Option<SessionOutcome>, CoreError> {
        for effect in effects {
            match effect {
                AttemptEffect::PersistCredentials(delta) => {
                    self.ctx.store.apply_update(&delta).await?;
                }
                AttemptEffect::ShowQr {
                    payload,
                    refresh_index,
                } => {
                    self.ctx.presenter.show_qr(&payload, refresh_index);
                    self.ctx
                        .state
                        .update(StateCommand::SetAuthChallenge(Some(AuthChallenge::Qr {
                            payload,
                            refresh_index,
                        })))
                        .await?;
                }
                AttemptEffect::RequestPairingCode => self.spawn_pairing_request(),
                AttemptEffect::ArmDeadline { kind, after } => {
                    debug!("Armed {kind} of {after:?}");
                    self.deadline = Some(Box::pin(sleep(after)));
                }
                AttemptEffect::DisarmDeadline => {
                    self.deadline = None;
                }
                AttemptEffect::MarkConnected => {
                    self.ctx.state.update(StateCommand::MarkConnected).await?;
                    self.ctx.presenter.status("Connected");
                    self.ctx
                        .dispatcher
                        .attach(LiveSocket {
                            attempt_id: self.attempt_id,
                            control: Arc::clone(&self.control),
                        })
                        .await;
                }
                AttemptEffect::Finish(AttemptEnd::Closed(cause)) => {
                    info!("Attempt {} closed: {cause}", self.attempt_id);
                    return Ok(Some(SessionOutcome::Closed {
                        cause,
                        was_connected: self.machine.was_open(),
                    }));
                }
                AttemptEffect::Finish(AttemptEnd::TimedOut(kind)) => {
                    warn!("Attempt {} hit the {kind}", self.attempt_id);
                    return Ok(Some(SessionOutcome::TimedOut(kind)));
                }
            }
        }

        Ok(None)
    }

    fn spawn_pairing_request(&mut self) {
        let Some(phone) = self.attempt.phone_number() else {
            warn!("Pairing attempt without a phone number; no code requested");
            return;
        };

        let phone = phone.as_str().to_string();
        let control = Arc::clone(&self.control);
        let presenter = Arc::clone(&self.ctx.presenter);
        let state = self.ctx.state.clone();

        self.pairing_task = Some(tokio::spawn(async move {
            match control.request_pairing_code(&phone).await {
                Ok(code) => {
                    presenter.show_pairing_code(&code);
                    let challenge = AuthChallenge::PairingCode { code };
                    if let Err(e) = state
                        .update(StateCommand::SetAuthChallenge(Some(challenge)))
                        .await
                    {
                        warn!("Failed to record pairing code: {e}");
                    }
                }
                Err(e) => {
                    warn!("Pairing code request failed: {e}");
                    presenter.status("Pairing code request failed; waiting for the connection to settle");
                }
            }
        }));
    }

    async fn shutdown(&mut self) {
        if let Some(task) = self.pairing_task.take() {
            task.abort();
        }
        self.deadline = None;
        self.control.close().await;

        if !self.machine.was_open() {
            if let Err(e) = self
                .ctx
                .state
                .update(StateCommand::SetAuthChallenge(None))
                .await
            {
                warn!("Failed to clear auth challenge: {e}");
            }
        }
    }
}

async fn wait_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
