//! Out-of-process supervision: respawn the worker when it asks for it.

use crate::config::{ENV_ROLE, ProcessRole, SupervisorConfig};
use crate::error::supervisor::SupervisorError;
use crate::{EXIT_RESTART, EXIT_STARTUP_FAILURE};

use common::ErrorLocation;
use models::SupervisorDirective;

use std::env;
use std::panic::Location;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use log::{error, info, warn};
use tokio::process::Command as TokioCommand;
use tokio::time::sleep;

/// What to do with a worker that exited with `code` (`None` when a signal
/// killed it).
///
/// `consecutive_restarts` counts respawns in a row including the one this
/// exit would cause.
pub fn directive_for_exit(
    code: Option<i32>,
    consecutive_restarts: u32,
    max_process_restarts: u32,
) -> SupervisorDirective {
    match code {
        Some(EXIT_RESTART) if consecutive_restarts <= max_process_restarts => {
            SupervisorDirective::RestartProcess
        }
        Some(EXIT_RESTART) => SupervisorDirective::Stop {
            code: EXIT_STARTUP_FAILURE,
        },
        Some(code) => SupervisorDirective::Stop { code },
        None => SupervisorDirective::Stop {
            code: EXIT_STARTUP_FAILURE,
        },
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    program: PathBuf,
    args: Vec<String>,
    config: SupervisorConfig,
}

impl ProcessSupervisor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, config: SupervisorConfig) -> Self {
        Self {
            program: program.into(),
            args,
            config,
        }
    }

    /// Supervise the running executable with the arguments it was given.
    #[track_caller]
    pub fn for_current_exe(config: SupervisorConfig) -> Result<Self, SupervisorError> {
        let program = env::current_exe().map_err(|e| SupervisorError::Spawn {
            message: "Cannot locate the current executable".to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;
        Ok(Self::new(program, env::args().skip(1).collect(), config))
    }

    /// Spawn workers until one exits with something other than the restart
    /// code. Returns that exit code.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::Spawn`] / [`SupervisorError::Wait`] on process failures
    /// - [`SupervisorError::CeilingExceeded`] after too many restarts in a row
    pub async fn run(&self) -> Result<i32, SupervisorError> {
        let mut consecutive: u32 = 0;

        loop {
            let started = Instant::now();
            let code = self.spawn_and_wait().await?;

            if started.elapsed() >= self.config.stable_after {
                consecutive = 0;
            }
            let restarts = match code {
                Some(EXIT_RESTART) => consecutive.saturating_add(1),
                _ => consecutive,
            };

            match directive_for_exit(code, restarts, self.config.max_process_restarts) {
                SupervisorDirective::RestartProcess => {
                    consecutive = restarts;
                    warn!(
                        "Worker asked for a restart ({restarts} of {}); respawning in {:?}",
                        self.config.max_process_restarts, self.config.process_restart_delay
                    );
                    sleep(self.config.process_restart_delay).await;
                }
                SupervisorDirective::Stop { .. } if code == Some(EXIT_RESTART) => {
                    error!("Worker restart limit reached");
                    return Err(SupervisorError::CeilingExceeded {
                        restarts,
                        ceiling: self.config.max_process_restarts,
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                SupervisorDirective::Stop { code } => {
                    info!("Worker finished; supervisor exiting with code {code}");
                    return Ok(code);
                }
                SupervisorDirective::Continue | SupervisorDirective::RestartInProcess => {
                    return Ok(EXIT_STARTUP_FAILURE);
                }
            }
        }
    }

    async fn spawn_and_wait(&self) -> Result<Option<i32>, SupervisorError> {
        let mut child = TokioCommand::new(&self.program)
            .args(&self.args)
            .env(ENV_ROLE, ProcessRole::Worker.as_str())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SupervisorError::Spawn {
                message: format!("Failed to spawn worker {}", self.program.display()),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })?;

        info!("Worker started (PID: {:?})", child.id());

        let status = child.wait().await.map_err(|e| SupervisorError::Wait {
            message: "Failed to wait for worker".to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

        match status.code() {
            Some(code) => info!("Worker exited with code {code}"),
            None => warn!("Worker terminated by a signal"),
        }
        Ok(status.code())
    }
}
