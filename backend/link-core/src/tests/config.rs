// Unit tests for environment configuration

use crate::config::{
    BotConfig, ENV_AUTH_DIR, ENV_AUTH_METHOD, ENV_LOG_DIR, ENV_MAX_CONNECTION_ATTEMPTS,
    ENV_RECONNECT_BASE_MS, ENV_RECONNECT_CAP_MS, ENV_ROLE, ProcessRole,
};
use crate::error::ConfigError;

use models::AuthMethod;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

const DIRS: [(&str, &str); 2] = [(ENV_AUTH_DIR, "/tmp/linkbot/auth"), (ENV_LOG_DIR, "/tmp/linkbot/logs")];

#[test]
fn given_only_paths_when_loaded_then_defaults_apply() {
    let config = BotConfig::from_lookup(lookup(&DIRS)).unwrap();

    assert_eq!(config.role, ProcessRole::Supervisor);
    assert_eq!(config.auth_dir, PathBuf::from("/tmp/linkbot/auth"));
    assert_eq!(config.connection.connect_timeout, Duration::from_secs(20));
    assert_eq!(config.connection.auth_window, Duration::from_secs(60));
    assert_eq!(config.connection.max_connection_attempts, 3);
    assert_eq!(config.supervisor.max_restarts, 3);
    assert_eq!(config.supervisor.max_process_restarts, 5);
    assert_eq!(config.auth.preferred_method, None);
}

#[test]
fn given_overrides_when_loaded_then_parsed() {
    let mut vars = DIRS.to_vec();
    vars.extend([
        (ENV_ROLE, "Worker"),
        (ENV_AUTH_METHOD, "pairing"),
        (ENV_RECONNECT_BASE_MS, "500"),
        (ENV_MAX_CONNECTION_ATTEMPTS, "5"),
    ]);

    let config = BotConfig::from_lookup(lookup(&vars)).unwrap();

    assert_eq!(config.role, ProcessRole::Worker);
    assert_eq!(config.auth.preferred_method, Some(AuthMethod::Pairing));
    assert_eq!(config.connection.reconnect_base, Duration::from_millis(500));
    assert_eq!(config.connection.max_connection_attempts, 5);
}

#[test]
fn given_malformed_number_when_loaded_then_parse_error_names_variable() {
    let mut vars = DIRS.to_vec();
    vars.push((ENV_MAX_CONNECTION_ATTEMPTS, "three"));

    match BotConfig::from_lookup(lookup(&vars)) {
        Err(ConfigError::ParseError { variable, value, .. }) => {
            assert_eq!(variable, ENV_MAX_CONNECTION_ATTEMPTS);
            assert_eq!(value, "three");
        }
        other => panic!("expected ParseError, got {other:?}"),
    }
}

#[test]
fn given_cap_below_base_when_loaded_then_validation_error() {
    let mut vars = DIRS.to_vec();
    vars.extend([(ENV_RECONNECT_BASE_MS, "5000"), (ENV_RECONNECT_CAP_MS, "1000")]);

    assert!(matches!(
        BotConfig::from_lookup(lookup(&vars)),
        Err(ConfigError::ValidationError { .. })
    ));
}

#[test]
fn given_zero_attempts_when_loaded_then_validation_error() {
    let mut vars = DIRS.to_vec();
    vars.push((ENV_MAX_CONNECTION_ATTEMPTS, "0"));

    assert!(matches!(
        BotConfig::from_lookup(lookup(&vars)),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: `from_env` reads the real process environment.
///
/// **WHY THIS MATTERS**: The supervisor hands the role to the worker through
/// the environment; if `from_env` ignored it the worker would spawn workers.
#[test]
#[serial]
fn given_role_in_environment_when_from_env_then_worker() {
    // SAFETY: serialized with every other test that touches the environment.
    unsafe {
        env::set_var(ENV_ROLE, "worker");
        env::set_var(ENV_AUTH_DIR, "/tmp/linkbot-env/auth");
        env::set_var(ENV_LOG_DIR, "/tmp/linkbot-env/logs");
    }

    let result = BotConfig::from_env();

    unsafe {
        env::remove_var(ENV_ROLE);
        env::remove_var(ENV_AUTH_DIR);
        env::remove_var(ENV_LOG_DIR);
    }

    let config = result.unwrap();
    assert_eq!(config.role, ProcessRole::Worker);
    assert_eq!(config.auth_dir, PathBuf::from("/tmp/linkbot-env/auth"));
}
