use crate::engine::command::{locate_executable, run_with_stdin};
use crate::engine::eslint::{build_eslint_command, generated_config, parse_report};
use crate::engine::prettier::{build_prettier_command, config_file_options};
use crate::engine::tsfmt::{
    NODE_BINARY, TSFMT_MODULE, TsFmtCli, build_runner_command, engine_options,
};
use crate::engine::{LintRequest, Options, TsFmtEngine, TsFmtOptions, TsFmtResult};
use crate::error::engine::EngineError;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn args(cmd: &tokio::process::Command) -> Vec<String> {
    cmd.as_std()
        .get_args()
        .map(|arg: &OsStr| arg.to_string_lossy().to_string())
        .collect()
}

fn lint_request() -> LintRequest {
    LintRequest {
        text: "const a = 1".to_string(),
        file_path: PathBuf::from("src/a.ts"),
        ..LintRequest::default()
    }
}

// ----------------------------------------------------------------------------
// prettier
// ----------------------------------------------------------------------------

#[test]
fn given_filepath_and_parser_when_building_prettier_command_then_passed_as_flags() {
    // GIVEN
    let opts = options(json!({ "semi": true, "filepath": "a.ts", "parser": "typescript" }));

    // WHEN
    let cmd = build_prettier_command(
        Path::new("prettier"),
        Path::new("/tmp/options.json"),
        &opts,
        Path::new("/project"),
    );

    // THEN
    let args = args(&cmd);
    assert_eq!(
        args,
        vec![
            "--config",
            "/tmp/options.json",
            "--no-editorconfig",
            "--stdin-filepath",
            "a.ts",
            "--parser",
            "typescript"
        ]
    );
}

#[test]
fn given_filepath_option_when_writing_config_then_filepath_excluded() {
    let opts = options(json!({ "semi": false, "filepath": "a.ts", "parser": "babel" }));

    let config = config_file_options(&opts);

    assert!(!config.contains_key("filepath"));
    assert_eq!(config.get("semi"), Some(&json!(false)));
    assert_eq!(config.get("parser"), Some(&json!("babel")));
}

// ----------------------------------------------------------------------------
// eslint
// ----------------------------------------------------------------------------

#[test]
fn given_only_config_file_when_generating_config_then_file_used_as_is() {
    // GIVEN
    let request = LintRequest {
        override_config_file: Some(PathBuf::from("/project/.eslintrc.json")),
        ..lint_request()
    };

    // WHEN / THEN
    assert_eq!(generated_config(&request), None);
}

/// **VALUE**: Inline config and config file combine, inline winning.
///
/// **BUG THIS CATCHES**: Would catch the file being dropped when an inline
/// object is also sent, or the inline `extends` being overwritten.
#[test]
fn given_inline_config_and_file_when_generating_config_then_file_prepended_to_extends() {
    // GIVEN
    let request = LintRequest {
        override_config: Some(options(json!({
            "extends": ["plugin:@typescript-eslint/recommended"],
            "rules": { "semi": "error" }
        }))),
        override_config_file: Some(PathBuf::from("/project/.eslintrc.json")),
        ..lint_request()
    };

    // WHEN
    let config = generated_config(&request).expect("config generated");

    // THEN
    assert_eq!(
        config.get("extends"),
        Some(&json!([
            "/project/.eslintrc.json",
            "plugin:@typescript-eslint/recommended"
        ]))
    );
    assert_eq!(config.get("rules"), Some(&json!({ "semi": "error" })));
}

#[test]
fn given_ts_config_root_dir_when_generating_config_then_parser_options_set() {
    // GIVEN: Existing parser options must survive
    let request = LintRequest {
        override_config: Some(options(json!({ "parserOptions": { "project": "./tsconfig.json" } }))),
        ts_config_root_dir: Some(PathBuf::from("/project")),
        ..lint_request()
    };

    // WHEN
    let config = generated_config(&request).expect("config generated");

    // THEN
    assert_eq!(
        config.get("parserOptions"),
        Some(&json!({ "project": "./tsconfig.json", "tsconfigRootDir": "/project" }))
    );
}

#[test]
fn given_lint_request_when_building_eslint_command_then_reads_stdin_with_fix_dry_run() {
    let request = lint_request();

    let cmd = build_eslint_command(
        Path::new("eslint"),
        Path::new("/tmp/eslint.json"),
        &request,
        Path::new("/project"),
    );

    let args = args(&cmd);
    assert!(args.contains(&"--stdin".to_string()));
    assert!(args.contains(&"--fix-dry-run".to_string()));
    assert!(args.windows(2).any(|w| w == ["--stdin-filename", "src/a.ts"]));
    assert!(args.windows(2).any(|w| w == ["--config", "/tmp/eslint.json"]));
    assert!(args.windows(2).any(|w| w == ["--resolve-plugins-relative-to", "/project"]));
}

#[test]
fn given_eslint_json_report_when_parsed_then_results_and_fatal_flag() {
    // GIVEN: One clean result with fixes and one fatal parse error
    let report = r#"[
        {"filePath":"a.ts","messages":[],"errorCount":0,"fatalErrorCount":0,"warningCount":0,"output":"const a = 1;\n"},
        {"filePath":"b.ts","messages":[{"ruleId":null,"severity":2,"message":"Parsing error: ';' expected.","line":1,"column":5,"fatal":true}],"errorCount":1,"fatalErrorCount":1,"warningCount":0}
    ]"#;

    // WHEN
    let results = parse_report(report).expect("valid report");

    // THEN
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].output.as_deref(), Some("const a = 1;\n"));
    assert!(!results[0].is_fatal());
    assert!(results[1].is_fatal());
    assert_eq!(results[1].messages[0].line, Some(1));
}

#[test]
fn given_garbage_report_when_parsed_then_output_error() {
    assert!(matches!(
        parse_report("Oops! Something went wrong!"),
        Err(EngineError::Output { .. })
    ));
}

// ----------------------------------------------------------------------------
// tsfmt
// ----------------------------------------------------------------------------

#[test]
fn given_default_options_when_building_engine_options_then_read_only_with_base_dir() {
    let engine = engine_options(&TsFmtOptions::default(), Path::new("/project"));

    assert_eq!(
        Value::Object(engine),
        json!({ "baseDir": "/project", "replace": false, "verify": false })
    );
}

#[test]
fn given_disabled_sources_and_files_when_building_engine_options_then_camel_case_and_no_nulls() {
    // GIVEN: tslint disabled, a tsfmt file given, an explicit base directory
    let options = TsFmtOptions {
        basedir: Some(PathBuf::from("/base")),
        tslint: Some(false),
        tsfmt_file: Some(PathBuf::from("tsfmt.json")),
        ..TsFmtOptions::default()
    };

    // WHEN
    let engine = engine_options(&options, Path::new("/project"));

    // THEN
    assert_eq!(engine.get("baseDir"), Some(&json!("/base")));
    assert_eq!(engine.get("tslint"), Some(&json!(false)));
    assert_eq!(engine.get("tsfmtFile"), Some(&json!("tsfmt.json")));
    assert!(!engine.contains_key("basedir"));
    assert!(!engine.contains_key("tsconfig"));
    assert!(engine.values().all(|value| !value.is_null()));
}

#[test]
fn given_node_program_when_building_runner_command_then_module_passed_after_script() {
    let cmd = build_runner_command(Path::new("node"), Path::new("/project"));

    let args = args(&cmd);
    assert_eq!(args.len(), 3);
    assert_eq!(args[0], "-e");
    assert_eq!(args[2], TSFMT_MODULE);
    assert_eq!(cmd.as_std().get_current_dir(), Some(Path::new("/project")));
}

#[cfg(unix)]
fn fake_node(dir: &Path, body: &str) -> TsFmtCli {
    use std::os::unix::fs::PermissionsExt;

    let bin_dir = dir.join("node_modules").join(".bin");
    std::fs::create_dir_all(&bin_dir).expect("create bin dir");
    let node = bin_dir.join(NODE_BINARY);
    std::fs::write(&node, format!("#!/bin/sh\ncat > /dev/null\n{body}\n")).expect("write stub");
    std::fs::set_permissions(&node, std::fs::Permissions::from_mode(0o755)).expect("chmod stub");

    TsFmtCli::new(dir)
}

/// **VALUE**: A crashing engine is an engine exception, not a bad request.
///
/// **BUG THIS CATCHES**: Would catch a non-zero exit (an uncaught TypeError
/// inside the module) being reported as `{ error: true }`, which the
/// endpoint turns into a 400 instead of a 500.
#[cfg(unix)]
#[tokio::test]
async fn given_engine_crashes_when_processing_string_then_engine_failed() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");
    let engine = fake_node(
        dir.path(),
        "echo \"TypeError: Cannot read properties of undefined (reading 'options')\" >&2\n\
         echo '    at Object.<anonymous> (typescript-formatter/lib/index.js:1:1)' >&2\nexit 1",
    );

    // WHEN
    let result = engine
        .process_string("format-input.ts", "const a=1", &TsFmtOptions::default())
        .await;

    // THEN
    match result {
        Err(EngineError::Failed { message, .. }) => {
            assert!(message.starts_with("TypeError: Cannot read properties of undefined"));
        }
        other => panic!("expected engine failure, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn given_engine_reports_error_when_processing_string_then_ok_with_error_flag() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");
    let engine = fake_node(
        dir.path(),
        r#"printf '{"error":true,"message":"format-input.ts(1,5): error TS1005","dest":""}'"#,
    );

    // WHEN
    let result = engine
        .process_string("format-input.ts", "const a=", &TsFmtOptions::default())
        .await
        .expect("reported error is not an engine failure");

    // THEN
    assert!(result.error);
    assert_eq!(result.message, "format-input.ts(1,5): error TS1005");
}

#[cfg(unix)]
#[tokio::test]
async fn given_engine_prints_formatted_result_when_processing_string_then_dest_returned() {
    let dir = TempDir::new().expect("tempdir");
    let engine = fake_node(
        dir.path(),
        r#"printf '{"error":false,"message":"","dest":"const a = 1;\\n"}'"#,
    );

    let result = engine
        .process_string("format-input.ts", "const a=1", &TsFmtOptions::default())
        .await
        .expect("formatted");

    assert_eq!(result, TsFmtResult::formatted("const a = 1;\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn given_engine_prints_no_result_when_processing_string_then_engine_failed() {
    let dir = TempDir::new().expect("tempdir");
    let engine = fake_node(dir.path(), "echo 'const a = 1;'");

    let result = engine
        .process_string("format-input.ts", "const a=1", &TsFmtOptions::default())
        .await;

    assert!(matches!(result, Err(EngineError::Failed { .. })));
}

#[test]
fn given_camel_case_options_when_deserialized_then_typed_fields_set() {
    let options: TsFmtOptions = serde_json::from_value(json!({
        "basedir": "/base",
        "tsconfigFile": "tsconfig.json",
        "editorconfig": false
    }))
    .expect("valid options");

    assert_eq!(options.tsconfig_file, Some(PathBuf::from("tsconfig.json")));
    assert_eq!(options.editorconfig, Some(false));
}

// ----------------------------------------------------------------------------
// command
// ----------------------------------------------------------------------------

#[test]
fn given_no_such_tool_when_locating_then_unavailable_error() {
    let dir = TempDir::new().expect("tempdir");

    let result = locate_executable("definitely-not-a-formatter-binary", dir.path());

    assert!(matches!(result, Err(EngineError::Unavailable { .. })));
}

#[cfg(unix)]
#[test]
fn given_project_local_bin_when_locating_then_prefers_node_modules() {
    // GIVEN: node_modules/.bin/prettier inside the project
    let dir = TempDir::new().expect("tempdir");
    let bin_dir = dir.path().join("node_modules").join(".bin");
    std::fs::create_dir_all(&bin_dir).expect("create bin dir");
    std::fs::write(bin_dir.join("prettier"), "#!/bin/sh\n").expect("write stub");

    // WHEN
    let located = locate_executable("prettier", dir.path()).expect("found");

    // THEN
    assert_eq!(located, bin_dir.join("prettier"));
}

#[cfg(unix)]
#[tokio::test]
async fn given_cat_when_running_with_stdin_then_output_echoes_input() {
    // GIVEN
    let command = tokio::process::Command::new("cat");

    // WHEN
    let output = run_with_stdin(command, "const x = 1;\n").await.expect("cat runs");

    // THEN
    assert!(output.success());
    assert_eq!(output.stdout, "const x = 1;\n");
}

#[cfg(unix)]
#[tokio::test]
async fn given_failing_tool_when_running_then_failure_message_from_stderr() {
    // GIVEN
    let mut command = tokio::process::Command::new("sh");
    command.arg("-c").arg("echo 'bad input' >&2; exit 2");

    // WHEN
    let output = run_with_stdin(command, "ignored").await.expect("sh runs");

    // THEN
    assert!(!output.success());
    assert_eq!(output.code(), Some(2));
    assert_eq!(output.failure_message(), "bad input");
}
