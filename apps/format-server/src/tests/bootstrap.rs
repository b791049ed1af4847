// Unit tests for the startup sequence (no server is started here)

use crate::bootstrap::prepare;
use crate::error::FormatServerError;

use format_core::config::{
    BackendKind, CONFIG_FILE_NAME, DotenvStatus, ENV_BACKEND, ENV_INSTANCE_MODE,
    ENV_NODE_PROJECT_DIR, ENV_PORT_FILE_DIR,
};

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

/// **VALUE**: Multi-instance mode without an id stops startup.
///
/// **BUG THIS CATCHES**: Would catch the instance silently publishing the
/// shared `server.port` and racing with its siblings.
#[test]
#[serial]
fn given_multi_mode_without_id_when_preparing_then_identity_error() {
    // GIVEN
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "instance_mode": "multi" }"#)
        .expect("write config");

    // WHEN
    let result = prepare(dir.path(), ["--some-other-flag"]);

    // THEN
    assert!(matches!(result, Err(FormatServerError::Identity { .. })));
}

#[test]
#[serial]
fn given_multi_mode_with_id_when_preparing_then_id_and_dirs_resolved() {
    // GIVEN
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "instance_mode": "multi", "backend": "eslint", "port_file_dir": "ports" }"#,
    )
    .expect("write config");

    // WHEN
    let startup = prepare(dir.path(), ["--node-server-instance-id=x9"]).expect("valid startup");

    // THEN
    assert_eq!(startup.instance_id.map(|id| id.to_string()), Some("x9".to_string()));
    assert_eq!(startup.config.backend, BackendKind::Eslint);
    assert_eq!(startup.port_file_dir, dir.path().join("ports"));
    assert_eq!(startup.node_project_dir, dir.path());
}

#[test]
#[serial]
fn given_corrupt_config_when_preparing_then_config_error() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").expect("write config");

    let result = prepare(dir.path(), Vec::<String>::new());

    assert!(matches!(result, Err(FormatServerError::Config { .. })));
}

/// **VALUE**: What configuration resolution found survives until logging is
/// installed.
///
/// **BUG THIS CATCHES**: Would catch the `.env` warning and the config file
/// path being dropped because they were logged before the logger existed.
#[test]
#[serial]
fn given_config_file_and_malformed_dotenv_when_preparing_then_sources_kept_for_logging() {
    // GIVEN
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "backend": "tsfmt" }"#)
        .expect("write config");
    std::fs::write(dir.path().join(".env"), "not an assignment\n").expect("write .env");

    // WHEN
    let startup = prepare(dir.path(), Vec::<String>::new()).expect("valid startup");
    clear_env();

    // THEN
    assert_eq!(startup.config.backend, BackendKind::TsFmt);
    assert_eq!(startup.sources.config_file, Some(dir.path().join(CONFIG_FILE_NAME)));
    assert!(matches!(startup.sources.dotenv, DotenvStatus::Invalid { .. }));
}
