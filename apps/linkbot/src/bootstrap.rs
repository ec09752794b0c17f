//! Process entry: configuration, logging, then the role this process plays.
//!
//! The only place that turns failures into exit codes.

use crate::dispatcher::LoggingDispatcher;
use crate::error::LinkbotError;
use crate::logger::initialize as LoggerInitialize;
use crate::presenter::ConsolePresenter;

use common::ErrorLocation;
use link_core::auth::AuthMethodSelector;
use link_core::config::{BotConfig, ENV_BRIDGE_COMMAND, ProcessRole};
use link_core::connection::{ConnectionManager, LifecycleContext, Presenter};
use link_core::error::CoreError;
use link_core::protocol::{BridgeProtocol, SessionProtocol};
use link_core::runtime::RuntimeState;
use link_core::session_store::SessionStore;
use link_core::supervisor::{ProcessSupervisor, WorkerSupervisor};
use link_core::{EXIT_STARTUP_FAILURE, LINKBOT_NAME};

use std::panic::{Location, set_hook, take_hook};
use std::sync::Arc;

use log::{error, info};

/// Run this process to completion and return its exit code.
pub async fn run() -> i32 {
    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{LINKBOT_NAME}: invalid configuration: {e}");
            return EXIT_STARTUP_FAILURE;
        }
    };

    if let Err(e) = LoggerInitialize(&config.log_dir, config.log_level, config.role) {
        eprintln!("{LINKBOT_NAME}: {e}");
        return EXIT_STARTUP_FAILURE;
    }
    install_panic_hook();

    info!("{LINKBOT_NAME} starting as {}", config.role.as_str());
    info!("Credential directory: {}", config.auth_dir.display());
    info!("Log directory: {}", config.log_dir.display());

    match config.role {
        ProcessRole::Supervisor => run_supervisor(&config).await,
        ProcessRole::Worker => run_worker(&config).await,
    }
}

/// Respawn the worker until it stops asking for restarts.
pub async fn run_supervisor(config: &BotConfig) -> i32 {
    let result = match ProcessSupervisor::for_current_exe(config.supervisor.clone()) {
        Ok(supervisor) => supervisor.run().await.map_err(LinkbotError::from),
        Err(e) => Err(LinkbotError::from(e)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("Supervisor stopped: {e}");
            EXIT_STARTUP_FAILURE
        }
    }
}

/// Run the connection lifecycle with in-process restarts.
pub async fn run_worker(config: &BotConfig) -> i32 {
    let protocol = match build_protocol(config) {
        Ok(protocol) => protocol,
        Err(e) => {
            error!("Cannot start worker: {e}");
            return EXIT_STARTUP_FAILURE;
        }
    };

    if let Some(port) = config.dashboard_port {
        info!("Dashboard collaborator configured on port {port}");
    }

    let state = RuntimeState::new();
    let presenter: Arc<dyn Presenter> = Arc::new(ConsolePresenter::new());
    let ctx = LifecycleContext {
        store: SessionStore::new(config.auth_dir.clone()),
        state: state.clone(),
        protocol,
        presenter: Arc::clone(&presenter),
        dispatcher: Arc::new(LoggingDispatcher),
        connection: config.connection.clone(),
    };

    let preferences = config.auth.clone();
    let factory = move || -> Result<ConnectionManager, CoreError> {
        let selector = AuthMethodSelector::detect(ctx.store.clone(), preferences.clone());
        Ok(ConnectionManager::new(ctx.clone(), selector))
    };

    let code = WorkerSupervisor::new(state, presenter, config.supervisor.clone(), factory)
        .run()
        .await;
    info!("Worker exiting with code {code}");
    code
}

#[track_caller]
fn build_protocol(config: &BotConfig) -> Result<Arc<dyn SessionProtocol>, LinkbotError> {
    let command = config
        .bridge_command
        .as_deref()
        .ok_or_else(|| LinkbotError::Linkbot {
            message: format!("{ENV_BRIDGE_COMMAND} is not set"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let protocol = BridgeProtocol::from_command_line(command).map_err(CoreError::from)?;
    info!("Session protocol bridge: {}", protocol.program());
    Ok(Arc::new(protocol))
}

fn install_panic_hook() {
    let default_hook = take_hook();
    set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        default_hook(panic_info);
    }));
}
