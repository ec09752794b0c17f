//! In-process restarts of the connection manager.

use crate::connection::{ConnectionManager, LifecycleExit, Presenter};
use crate::config::SupervisorConfig;
use crate::error::CoreError;
use crate::runtime::{RuntimeState, StateCommand};
use crate::supervisor::decide;
use crate::{EXIT_OK, EXIT_RESTART};

use models::{ConnectionStatus, SupervisorDirective};

use std::any::Any;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::task::JoinError;
use tokio::time::sleep;

/// Builds a fresh manager for every (re)start.
pub trait ManagerFactory: Send {
    fn build(&mut self) -> Result<ConnectionManager, CoreError>;
}

impl<F> ManagerFactory for F
where
    F: FnMut() -> Result<ConnectionManager, CoreError> + Send,
{
    fn build(&mut self) -> Result<ConnectionManager, CoreError> {
        self()
    }
}

pub struct WorkerSupervisor<F> {
    state: RuntimeState,
    presenter: Arc<dyn Presenter>,
    config: SupervisorConfig,
    factory: F,
}

impl<F: ManagerFactory> WorkerSupervisor<F> {
    pub fn new(
        state: RuntimeState,
        presenter: Arc<dyn Presenter>,
        config: SupervisorConfig,
        factory: F,
    ) -> Self {
        Self {
            state,
            presenter,
            config,
            factory,
        }
    }

    /// Run managers until one exits cleanly or a failure escalates. Returns
    /// the process exit code.
    pub async fn run(&mut self) -> i32 {
        loop {
            let failure = match self.run_once().await {
                Ok(LifecycleExit::UserExit) => return EXIT_OK,
                Err(failure) => failure,
            };

            let budget = self.state.retry_budget().await;
            let restarts = budget.restart_attempts.saturating_add(1);
            let directive = decide(&failure, restarts, self.config.max_restarts);
            error!("Connection manager failed: {failure}; directive: {directive}");

            match directive {
                SupervisorDirective::Continue => {
                    info!("Failure absorbed; starting a new manager");
                }
                SupervisorDirective::RestartInProcess => {
                    if let Err(e) = self.state.update(StateCommand::RecordRestart).await {
                        warn!("Failed to record restart: {e}");
                    }
                    self.presenter.status(&format!(
                        "Restarting ({restarts} of {}) in {:.1}s",
                        self.config.max_restarts,
                        self.config.restart_delay.as_secs_f64()
                    ));
                    sleep(self.config.restart_delay).await;
                    if let Err(e) = self
                        .state
                        .update(StateCommand::ResetConnectionAttempts)
                        .await
                    {
                        warn!("Failed to reset connection attempts: {e}");
                    }
                }
                SupervisorDirective::RestartProcess => {
                    self.presenter
                        .status("Restart limit reached; requesting a fresh process");
                    return EXIT_RESTART;
                }
                SupervisorDirective::Stop { code } => {
                    self.presenter.status(&format!("Stopping: {failure}"));
                    return code;
                }
            }
        }
    }

    /// Build and run one manager in its own task so a panic comes back as
    /// [`CoreError::Unexpected`].
    async fn run_once(&mut self) -> Result<LifecycleExit, CoreError> {
        let mut manager = self.factory.build()?;
        match tokio::spawn(async move { manager.run().await }).await {
            Ok(result) => result,
            Err(join_error) => {
                self.record_abandoned_manager().await;
                Err(CoreError::unexpected(describe_join_error(join_error)))
            }
        }
    }

    /// A manager that died mid-run never detached itself or reported its failure.
    async fn record_abandoned_manager(&self) {
        if let Err(e) = self.state.update(StateCommand::DetachManager).await {
            warn!("Failed to detach abandoned manager: {e}");
        }
        if let Err(e) = self
            .state
            .update(StateCommand::SetStatus(ConnectionStatus::TerminalError))
            .await
        {
            warn!("Failed to record terminal status: {e}");
        }
    }
}

fn describe_join_error(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return format!("Connection manager task cancelled: {join_error}");
    }
    format!(
        "Connection manager panicked: {}",
        panic_message(join_error.into_panic())
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    String::from("non-string panic payload")
}
