//! Environment-driven configuration for the bot process.
//!
//! The bootstrap accepts no flags: everything comes from `LINKBOT_*`
//! variables, optionally seeded from a `.env` file in the working directory
//! or next to the executable.

use crate::error::config::ConfigError;
use crate::{CREDENTIALS_DIR_NAME, LINKBOT_ENV_PREFIX, LINKBOT_NAME};

use common::ErrorLocation;
use models::AuthMethod;

use std::env;
use std::panic::Location;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use const_format::concatcp;
use log::{LevelFilter, debug, info, warn};

pub const ENV_ROLE: &str = concatcp!(LINKBOT_ENV_PREFIX, "ROLE");
pub const ENV_AUTH_DIR: &str = concatcp!(LINKBOT_ENV_PREFIX, "AUTH_DIR");
pub const ENV_LOG_DIR: &str = concatcp!(LINKBOT_ENV_PREFIX, "LOG_DIR");
pub const ENV_LOG_LEVEL: &str = concatcp!(LINKBOT_ENV_PREFIX, "LOG_LEVEL");
pub const ENV_DASHBOARD_PORT: &str = concatcp!(LINKBOT_ENV_PREFIX, "DASHBOARD_PORT");
pub const ENV_BRIDGE_COMMAND: &str = concatcp!(LINKBOT_ENV_PREFIX, "BRIDGE_COMMAND");
pub const ENV_AUTH_METHOD: &str = concatcp!(LINKBOT_ENV_PREFIX, "AUTH_METHOD");
pub const ENV_PHONE_NUMBER: &str = concatcp!(LINKBOT_ENV_PREFIX, "PHONE_NUMBER");
pub const ENV_CONNECT_TIMEOUT_SECS: &str = concatcp!(LINKBOT_ENV_PREFIX, "CONNECT_TIMEOUT_SECS");
pub const ENV_AUTH_WINDOW_SECS: &str = concatcp!(LINKBOT_ENV_PREFIX, "AUTH_WINDOW_SECS");
pub const ENV_RECONNECT_BASE_MS: &str = concatcp!(LINKBOT_ENV_PREFIX, "RECONNECT_BASE_MS");
pub const ENV_RECONNECT_CAP_MS: &str = concatcp!(LINKBOT_ENV_PREFIX, "RECONNECT_CAP_MS");
pub const ENV_MAX_CONNECTION_ATTEMPTS: &str =
    concatcp!(LINKBOT_ENV_PREFIX, "MAX_CONNECTION_ATTEMPTS");
pub const ENV_MAX_RESTARTS: &str = concatcp!(LINKBOT_ENV_PREFIX, "MAX_RESTARTS");
pub const ENV_RESTART_DELAY_MS: &str = concatcp!(LINKBOT_ENV_PREFIX, "RESTART_DELAY_MS");
pub const ENV_MAX_PROCESS_RESTARTS: &str = concatcp!(LINKBOT_ENV_PREFIX, "MAX_PROCESS_RESTARTS");

const ROLE_SUPERVISOR: &str = "supervisor";
const ROLE_WORKER: &str = "worker";
const LOG_DIR_NAME: &str = concatcp!(LINKBOT_NAME, "/logs");

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// Which half of the two-process arrangement this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessRole {
    /// Respawns the worker on the restart exit code.
    #[default]
    Supervisor,
    /// Runs the connection lifecycle.
    Worker,
}

impl ProcessRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessRole::Supervisor => ROLE_SUPERVISOR,
            ProcessRole::Worker => ROLE_WORKER,
        }
    }
}

impl FromStr for ProcessRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            ROLE_SUPERVISOR => Ok(ProcessRole::Supervisor),
            ROLE_WORKER => Ok(ProcessRole::Worker),
            other => Err(format!("expected '{ROLE_SUPERVISOR}' or '{ROLE_WORKER}', got '{other}'")),
        }
    }
}

// ============================================
// CONFIG STRUCTS
// ============================================

/// Timeouts and backoff for a single connection lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline from socket open to the first auth activity or open.
    pub connect_timeout: Duration,
    /// Shared QR/pairing validity window, from the first auth activity to open.
    pub auth_window: Duration,
    pub reconnect_base: Duration,
    pub reconnect_cap: Duration,
    /// In-process ceiling on socket opens between successful opens.
    pub max_connection_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            auth_window: Duration::from_secs(60),
            reconnect_base: Duration::from_millis(1_000),
            reconnect_cap: Duration::from_millis(10_000),
            max_connection_attempts: 3,
        }
    }
}

/// Ceilings for the two restart layers.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// In-process restarts before asking for a fresh process.
    pub max_restarts: u32,
    pub restart_delay: Duration,
    /// Consecutive worker respawns before the supervisor gives up.
    pub max_process_restarts: u32,
    pub process_restart_delay: Duration,
    /// A worker that lived this long resets the respawn counter.
    pub stable_after: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            restart_delay: Duration::from_millis(3_000),
            max_process_restarts: 5,
            process_restart_delay: Duration::from_millis(2_000),
            stable_after: Duration::from_secs(300),
        }
    }
}

/// Headless auth preference, consulted only when stdin is not a terminal.
#[derive(Debug, Clone, Default)]
pub struct AuthPreferences {
    pub preferred_method: Option<AuthMethod>,
    /// Raw phone number; validated by the selector.
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub role: ProcessRole,
    pub auth_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: Option<LevelFilter>,
    /// Port of the out-of-process dashboard; only reported.
    pub dashboard_port: Option<u16>,
    pub bridge_command: Option<String>,
    pub auth: AuthPreferences,
    pub connection: ConnectionConfig,
    pub supervisor: SupervisorConfig,
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BotConfig {
    /// Load `.env` (if any) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !try_load_dotenv() {
            debug!("No .env file found - using process environment only");
        }

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unset variables fall back to defaults; set-but-malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let role = parse_var::<ProcessRole, _>(&get, ENV_ROLE)?.unwrap_or_default();

        let auth_dir = match get(ENV_AUTH_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_path(CREDENTIALS_DIR_NAME)?,
        };

        let log_dir = match get(ENV_LOG_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_path(LOG_DIR_NAME)?,
        };

        let preferred_method = match get(ENV_AUTH_METHOD) {
            None => None,
            Some(raw) => Some(parse_auth_method(&raw)?),
        };

        let defaults = ConnectionConfig::default();
        let connection = ConnectionConfig {
            connect_timeout: parse_var::<u64, _>(&get, ENV_CONNECT_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            auth_window: parse_var::<u64, _>(&get, ENV_AUTH_WINDOW_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.auth_window),
            reconnect_base: parse_var::<u64, _>(&get, ENV_RECONNECT_BASE_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_base),
            reconnect_cap: parse_var::<u64, _>(&get, ENV_RECONNECT_CAP_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_cap),
            max_connection_attempts: parse_var::<u32, _>(&get, ENV_MAX_CONNECTION_ATTEMPTS)?
                .unwrap_or(defaults.max_connection_attempts),
        };

        let defaults = SupervisorConfig::default();
        let supervisor = SupervisorConfig {
            max_restarts: parse_var::<u32, _>(&get, ENV_MAX_RESTARTS)?
                .unwrap_or(defaults.max_restarts),
            restart_delay: parse_var::<u64, _>(&get, ENV_RESTART_DELAY_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.restart_delay),
            max_process_restarts: parse_var::<u32, _>(&get, ENV_MAX_PROCESS_RESTARTS)?
                .unwrap_or(defaults.max_process_restarts),
            ..defaults
        };

        let config = Self {
            role,
            auth_dir,
            log_dir,
            log_level: parse_var::<LevelFilter, _>(&get, ENV_LOG_LEVEL)?,
            dashboard_port: parse_var::<u16, _>(&get, ENV_DASHBOARD_PORT)?,
            bridge_command: get(ENV_BRIDGE_COMMAND),
            auth: AuthPreferences {
                preferred_method,
                phone_number: get(ENV_PHONE_NUMBER),
            },
            connection,
            supervisor,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let connection = &self.connection;

        if connection.connect_timeout.is_zero() || connection.auth_window.is_zero() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("Connect timeout and auth window must be non-zero"),
            });
        }

        if connection.reconnect_base.is_zero() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("Reconnect base delay must be non-zero"),
            });
        }

        if connection.reconnect_cap < connection.reconnect_base {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Reconnect cap ({:?}) is below the base delay ({:?})",
                    connection.reconnect_cap, connection.reconnect_base
                ),
            });
        }

        if connection.max_connection_attempts == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("At least one connection attempt must be allowed"),
            });
        }

        if self.role == ProcessRole::Worker && self.bridge_command.is_none() {
            warn!("{ENV_BRIDGE_COMMAND} is not set; the worker has no session protocol to open");
        }

        Ok(())
    }
}

fn parse_var<T, G>(get: &G, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                variable: name.to_string(),
                value,
                reason: e.to_string(),
            }),
    }
}

#[track_caller]
fn parse_auth_method(raw: &str) -> Result<AuthMethod, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "qr" => Ok(AuthMethod::Qr),
        "pairing" | "code" => Ok(AuthMethod::Pairing),
        _ => Err(ConfigError::ParseError {
            location: ErrorLocation::from(Location::caller()),
            variable: ENV_AUTH_METHOD.to_string(),
            value: raw.to_string(),
            reason: String::from("expected 'qr' or 'pairing'"),
        }),
    }
}

#[track_caller]
fn default_data_path(relative: &str) -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|base| base.join(relative))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
            reason: format!(
                "Cannot determine a data directory for {relative}. Set {ENV_AUTH_DIR} and {ENV_LOG_DIR}."
            ),
        })
}

/// Attempts to load .env from the working directory, then the executable's directory.
fn try_load_dotenv() -> bool {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return true;
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let env_path = exe_dir.join(".env");
            if env_path.exists() {
                match dotenvy::from_path(&env_path) {
                    Ok(_) => {
                        info!("Loaded .env from: {:?}", env_path);
                        return true;
                    }
                    Err(e) => warn!("Failed to parse .env at {:?}: {}", env_path, e),
                }
            }
        }
    }

    false
}
