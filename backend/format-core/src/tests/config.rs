use crate::DEFAULT_BODY_LIMIT_BYTES;
use crate::config::{
    BackendKind, CONFIG_FILE_NAME, DotenvStatus, ENV_BACKEND, ENV_INSTANCE_MODE,
    ENV_NODE_PROJECT_DIR, ENV_PORT_FILE_DIR, InstanceMode, ServerConfig,
};
use crate::error::config::ConfigError;
use crate::session::shutdown::DrainMode;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

fn clear_env() {
    // SAFETY: every test touching these variables is #[serial].
    unsafe {
        std::env::remove_var(ENV_BACKEND);
        std::env::remove_var(ENV_INSTANCE_MODE);
        std::env::remove_var(ENV_PORT_FILE_DIR);
        std::env::remove_var(ENV_NODE_PROJECT_DIR);
    }
}

fn write_config(dir: &Path, json: &str) {
    std::fs::write(dir.join(CONFIG_FILE_NAME), json).expect("write config");
}

#[test]
fn given_no_config_file_when_loaded_then_defaults() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");

    // WHEN
    let config = ServerConfig::load(dir.path()).expect("defaults");

    // THEN
    assert_eq!(config, ServerConfig::default());
    assert_eq!(config.backend, BackendKind::Prettier);
    assert_eq!(config.instance_mode, InstanceMode::Single);
    assert_eq!(config.body_limit_bytes, DEFAULT_BODY_LIMIT_BYTES);
}

#[test]
fn given_partial_config_when_loaded_then_missing_fields_defaulted() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");
    write_config(
        dir.path(),
        r#"{ "backend": "tsfmt", "instance_mode": "multi", "shutdown": { "force": false } }"#,
    );

    // WHEN
    let config = ServerConfig::load(dir.path()).expect("valid config");

    // THEN
    assert_eq!(config.backend, BackendKind::TsFmt);
    assert_eq!(config.instance_mode, InstanceMode::Multi);
    let policy = config.shutdown.drain_policy();
    assert_eq!(policy.mode, DrainMode::Cooperative);
    assert_eq!(policy.ack_delay, Duration::from_millis(200));
    assert_eq!(policy.grace_period, Duration::from_millis(5000));
}

/// **VALUE**: A corrupt config file is an error, not a silent fallback.
///
/// **BUG THIS CATCHES**: Would catch a typo in `"backend"` starting a
/// prettier server where an eslint one was configured.
#[test]
fn given_corrupt_config_when_loaded_then_parse_error() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");
    write_config(dir.path(), r#"{ "backend": "eslnt" }"#);

    // WHEN
    let result = ServerConfig::load(dir.path());

    // THEN
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn given_tiny_body_limit_when_validated_then_validation_error() {
    let config = ServerConfig {
        body_limit_bytes: 10,
        ..ServerConfig::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

#[test]
fn given_future_version_when_validated_then_validation_error() {
    let config = ServerConfig {
        version: 99,
        ..ServerConfig::default()
    };

    assert!(config.validate().is_err());
}

#[test]
fn given_relative_dirs_when_resolved_then_joined_with_working_dir() {
    // GIVEN
    let config = ServerConfig {
        port_file_dir: Some(PathBuf::from("run")),
        node_project_dir: None,
        ..ServerConfig::default()
    };
    let working_dir = Path::new("/work");

    // WHEN / THEN
    assert_eq!(config.port_file_dir(working_dir), PathBuf::from("/work/run"));
    assert_eq!(config.node_project_dir(working_dir), PathBuf::from("/work"));
}

#[test]
#[serial]
fn given_env_overrides_when_resolved_then_env_wins_over_file() {
    // GIVEN: File says prettier/single, environment says eslint/multi
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    write_config(dir.path(), r#"{ "backend": "prettier", "instance_mode": "single" }"#);
    unsafe {
        std::env::set_var(ENV_BACKEND, "ESLint");
        std::env::set_var(ENV_INSTANCE_MODE, "multi");
        std::env::set_var(ENV_PORT_FILE_DIR, "/tmp/ports");
    }

    // WHEN
    let result = ServerConfig::resolve(dir.path());
    clear_env();

    // THEN
    let config = result.expect("valid config");
    assert_eq!(config.backend, BackendKind::Eslint);
    assert_eq!(config.instance_mode, InstanceMode::Multi);
    assert_eq!(config.port_file_dir, Some(PathBuf::from("/tmp/ports")));
}

#[test]
#[serial]
fn given_unknown_backend_in_env_when_resolved_then_env_error() {
    // GIVEN
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    unsafe {
        std::env::set_var(ENV_BACKEND, "gofmt");
    }

    // WHEN
    let result = ServerConfig::resolve(dir.path());
    clear_env();

    // THEN
    match result {
        Err(ConfigError::EnvError { variable, .. }) => assert_eq!(variable, ENV_BACKEND),
        other => panic!("expected EnvError, got {other:?}"),
    }
}

#[test]
#[serial]
fn given_dotenv_file_when_resolved_then_values_applied() {
    // GIVEN: A .env next to the (absent) config file
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join(".env"), format!("{ENV_BACKEND}=tsfmt\n")).expect("write .env");

    // WHEN
    let result = ServerConfig::resolve(dir.path());
    clear_env();

    // THEN
    assert_eq!(result.expect("valid config").backend, BackendKind::TsFmt);
}

/// **VALUE**: A broken `.env` is reported, not lost.
///
/// **BUG THIS CATCHES**: Would catch the parse failure being logged during
/// resolution, before any logger exists, and never reaching the log file.
#[test]
#[serial]
fn given_malformed_dotenv_when_resolved_with_sources_then_invalid_status_recorded() {
    // GIVEN
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join(".env"), "this line is not an assignment\n").expect("write .env");

    // WHEN
    let result = ServerConfig::resolve_with_sources(dir.path());
    clear_env();

    // THEN
    let (config, sources) = result.expect("a bad .env does not stop startup");
    assert_eq!(config.backend, BackendKind::Prettier);
    match sources.dotenv {
        DotenvStatus::Invalid { path, reason } => {
            assert_eq!(path, dir.path().join(".env"));
            assert!(!reason.is_empty());
        }
        other => panic!("expected invalid .env, got {other:?}"),
    }
    assert_eq!(sources.config_file, None);
}

#[test]
#[serial]
fn given_config_file_and_env_override_when_resolved_with_sources_then_both_recorded() {
    // GIVEN
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    write_config(dir.path(), r#"{ "backend": "eslint" }"#);
    unsafe {
        std::env::set_var(ENV_NODE_PROJECT_DIR, "/opt/formatters");
    }

    // WHEN
    let result = ServerConfig::resolve_with_sources(dir.path());
    clear_env();

    // THEN
    let (_, sources) = result.expect("valid config");
    assert_eq!(sources.config_file, Some(dir.path().join(CONFIG_FILE_NAME)));
    assert_eq!(sources.dotenv, DotenvStatus::Absent);
    assert_eq!(sources.env_overrides, vec![ENV_NODE_PROJECT_DIR]);
}
