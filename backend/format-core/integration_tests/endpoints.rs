#[cfg(unix)]
use crate::helpers::fake_executable;
use crate::helpers::{
    FakeLintEngine, FakeStyleEngine, FakeTsFmtEngine, TsFmtBehaviour, eslint, post_json, prettier,
    start, start_with, tsfmt,
};

#[cfg(unix)]
use format_core::engine::TsFmtEngine;
#[cfg(unix)]
use format_core::engine::tsfmt::TsFmtCli;
use format_core::engine::{LintMessage, LintResult, TsFmtResult};
#[cfg(unix)]
use format_core::server::Backend;

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};

// ============================================================================
// Public API tests for the formatter endpoints
// Real server on an ephemeral port, in-memory engines
// ============================================================================

// ----------------------------------------------------------------------------
// /prettier/format
// ----------------------------------------------------------------------------

/// **VALUE**: End-to-end style format through HTTP returns plain text.
///
/// **BUG THIS CATCHES**: Would catch the formatted text being JSON-encoded
/// (quoted, escaped newline) or the options not reaching the engine.
#[tokio::test]
async fn given_style_server_when_formatting_then_200_plain_text() {
    // GIVEN
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    // WHEN
    let response = post_json(
        &test.url("/prettier/format"),
        json!({ "file_content": "const x=1", "config_options": { "semi": true } }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[CONTENT_TYPE].to_str().expect("ascii").to_string();
    assert!(content_type.starts_with("text/plain"), "got {content_type}");
    assert_eq!(response.text().await.expect("body"), "const x = 1;\n");
}

#[tokio::test]
async fn given_formatted_input_when_formatting_again_then_unchanged() {
    // GIVEN
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;
    let url = test.url("/prettier/format");

    // WHEN
    let first = post_json(&url, json!({ "file_content": "let y=2", "config_options": {} }))
        .await
        .text()
        .await
        .expect("body");
    let second = post_json(&url, json!({ "file_content": first, "config_options": {} }))
        .await
        .text()
        .await
        .expect("body");

    // THEN
    assert_eq!(first, second);
}

#[tokio::test]
async fn given_missing_file_content_when_formatting_then_400_and_engine_not_called() {
    // GIVEN
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    // WHEN
    let response = post_json(&test.url("/prettier/format"), json!({ "config_options": {} })).await;

    // THEN
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.expect("body").contains("file_content"));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn given_engine_failure_when_formatting_then_500_with_engine_message() {
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    let response = post_json(
        &test.url("/prettier/format"),
        json!({ "file_content": "syntax error here", "config_options": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await.expect("body"),
        "SyntaxError: Unexpected token (1:8)"
    );
}

#[tokio::test]
async fn given_malformed_json_when_formatting_then_400() {
    // GIVEN
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    // WHEN
    let response = reqwest::Client::new()
        .post(test.url("/prettier/format"))
        .header(CONTENT_TYPE, "application/json")
        .body("{ \"file_content\": ")
        .send()
        .await
        .expect("request sent");

    // THEN
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(engine.calls(), 0);
}

/// **VALUE**: Bodies over the configured limit are refused with 413.
///
/// **BUG THIS CATCHES**: Would catch the limit layer being dropped from the
/// router, letting arbitrarily large bodies be buffered in memory.
#[tokio::test]
async fn given_body_over_limit_when_formatting_then_413() {
    // GIVEN: A 2 KiB limit
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start_with(prettier(&engine), |server| server.body_limit(2048)).await;

    // WHEN: Sending 8 KiB of content
    let response = post_json(
        &test.url("/prettier/format"),
        json!({ "file_content": "x".repeat(8192), "config_options": {} }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn given_style_server_when_calling_lint_endpoint_then_404() {
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    let response = post_json(&test.url("/eslint/format"), json!({})).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ----------------------------------------------------------------------------
// /prettier/config-options
// ----------------------------------------------------------------------------

#[tokio::test]
async fn given_config_path_and_overrides_when_resolving_then_merged_json() {
    // GIVEN: A config file on disk
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;
    let config_path = test.dir.path().join(".prettierrc.json");
    std::fs::write(&config_path, r#"{ "semi": false, "tabWidth": 4 }"#).expect("write config");

    // WHEN
    let response = post_json(
        &test.url("/prettier/config-options"),
        json!({
            "prettier_config_path": config_path,
            "prettier_config_options": { "semi": true, "printWidth": 100 }
        }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(body, json!({ "semi": true, "tabWidth": 4, "printWidth": 100 }));
}

#[tokio::test]
async fn given_no_config_path_when_resolving_then_overrides_returned() {
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;

    let response = post_json(
        &test.url("/prettier/config-options"),
        json!({ "prettier_config_options": { "useTabs": true } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(body, json!({ "useTabs": true }));
}

#[tokio::test]
async fn given_unreadable_config_path_when_resolving_then_500_with_reason() {
    let engine = Arc::new(FakeStyleEngine::default());
    let test = start(prettier(&engine)).await;
    let missing = test.dir.path().join("missing.json");

    let response = post_json(
        &test.url("/prettier/config-options"),
        json!({ "prettier_config_path": missing, "prettier_config_options": { "semi": true } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.expect("body");
    assert!(body.starts_with("Error while resolving config:"), "got {body}");
}

// ----------------------------------------------------------------------------
// /eslint/format
// ----------------------------------------------------------------------------

/// **VALUE**: A lint request without config never reaches the engine.
///
/// **WHY THIS MATTERS**: This is the documented failure callers match on.
#[tokio::test]
async fn given_no_override_config_when_linting_then_400_no_config_provided() {
    // GIVEN
    let engine = Arc::new(FakeLintEngine::default());
    let test = start(eslint(&engine)).await;

    // WHEN
    let response = post_json(
        &test.url("/eslint/format"),
        json!({ "file_content": "const a=1", "file_path": "src/a.ts" }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.expect("body").contains("No config provided"));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn given_fixable_input_when_linting_then_fixed_text_returned() {
    // GIVEN
    let engine = Arc::new(FakeLintEngine::returning(vec![LintResult {
        file_path: "src/a.ts".to_string(),
        output: Some("const a = 1;\n".to_string()),
        ..LintResult::default()
    }]));
    let test = start(eslint(&engine)).await;

    // WHEN
    let response = post_json(
        &test.url("/eslint/format"),
        json!({
            "file_content": "const a=1",
            "file_path": "src/a.ts",
            "eslint_override_config": { "rules": { "semi": ["error", "always"] } },
            "node_modules_dir": "/project"
        }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "const a = 1;\n");
    let requests = engine.requests.lock().expect("lock");
    assert_eq!(requests[0].file_path.to_string_lossy(), "src/a.ts");
    assert!(requests[0].override_config.is_some());
    assert_eq!(
        requests[0].node_modules_dir.as_deref().map(|p| p.to_string_lossy().to_string()),
        Some("/project".to_string())
    );
}

#[tokio::test]
async fn given_nothing_to_fix_when_linting_then_input_returned() {
    let engine = Arc::new(FakeLintEngine::returning(vec![LintResult::default()]));
    let test = start(eslint(&engine)).await;

    let response = post_json(
        &test.url("/eslint/format"),
        json!({
            "file_content": "const a = 1;\n",
            "file_path": "a.ts",
            "eslint_override_config_file": "/project/.eslintrc.json"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "const a = 1;\n");
}

#[tokio::test]
async fn given_fatal_lint_result_when_linting_then_500_json_diagnostics() {
    // GIVEN
    let engine = Arc::new(FakeLintEngine::returning(vec![LintResult {
        fatal_error_count: 1,
        error_count: 1,
        messages: vec![LintMessage {
            message: "Parsing error: ';' expected.".to_string(),
            severity: 2,
            line: Some(1),
            column: Some(10),
            fatal: Some(true),
            ..LintMessage::default()
        }],
        ..LintResult::default()
    }]));
    let test = start(eslint(&engine)).await;

    // WHEN
    let response = post_json(
        &test.url("/eslint/format"),
        json!({
            "file_content": "const a = ",
            "file_path": "a.ts",
            "eslint_override_config": {}
        }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(body["message"], json!("Parsing error: ';' expected."));
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn given_engine_returns_no_results_when_linting_then_500() {
    let engine = Arc::new(FakeLintEngine::returning(Vec::new()));
    let test = start(eslint(&engine)).await;

    let response = post_json(
        &test.url("/eslint/format"),
        json!({ "file_content": "x", "file_path": "a.ts", "eslint_override_config": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await.expect("body"),
        "Unexpected number of results: 0"
    );
}

// ----------------------------------------------------------------------------
// /tsfmt/format
// ----------------------------------------------------------------------------

/// **VALUE**: An engine-reported error is the caller's problem: 400.
///
/// **BUG THIS CATCHES**: Would catch the error flag being ignored and the
/// empty `dest` returned as a successful (and destructive) format.
#[tokio::test]
async fn given_engine_reports_error_when_formatting_ts_then_400_with_message() {
    // GIVEN
    let engine = Arc::new(FakeTsFmtEngine::new(TsFmtBehaviour::Return(
        TsFmtResult::failed("parse error"),
    )));
    let test = start(tsfmt(&engine)).await;

    // WHEN
    let response = post_json(
        &test.url("/tsfmt/format"),
        json!({ "file_content": "class {", "config_options": {} }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.expect("body"), "parse error");
}

#[tokio::test]
async fn given_engine_throws_when_formatting_ts_then_500() {
    let engine = Arc::new(FakeTsFmtEngine::new(TsFmtBehaviour::Throw(
        "tsfmt not found".to_string(),
    )));
    let test = start(tsfmt(&engine)).await;

    let response = post_json(
        &test.url("/tsfmt/format"),
        json!({ "file_content": "class A {}", "config_options": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.expect("body"), "tsfmt not found");
}

/// **VALUE**: A crash inside the real TypeScript formatter is a server error.
///
/// **BUG THIS CATCHES**: Would catch the process-backed engine folding a
/// non-zero exit into an engine-reported error, which answers 400 and tells
/// the client its input was bad.
#[cfg(unix)]
#[tokio::test]
async fn given_process_engine_crashes_when_formatting_ts_then_500_with_stack() {
    // GIVEN: node_modules/.bin/node dies with an uncaught TypeError
    let project = tempfile::TempDir::new().expect("tempdir");
    fake_executable(
        project.path(),
        "node",
        "echo \"TypeError: Cannot read properties of undefined (reading 'baseDir')\" >&2\n\
         echo '    at Object.<anonymous> (typescript-formatter/lib/index.js:1:1)' >&2\nexit 1",
    );
    let backend = Backend::TsFmt(Arc::new(TsFmtCli::new(project.path())) as Arc<dyn TsFmtEngine>);
    let test = start(backend).await;

    // WHEN
    let response = post_json(
        &test.url("/tsfmt/format"),
        json!({ "file_content": "class A {}", "config_options": {} }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        response
            .text()
            .await
            .expect("body")
            .starts_with("TypeError: Cannot read properties of undefined")
    );
}

#[tokio::test]
async fn given_ts_options_when_formatting_then_virtual_file_name_and_typed_options_used() {
    // GIVEN
    let engine = Arc::new(FakeTsFmtEngine::new(TsFmtBehaviour::Return(
        TsFmtResult::formatted("class A {}\n"),
    )));
    let test = start(tsfmt(&engine)).await;

    // WHEN
    let response = post_json(
        &test.url("/tsfmt/format"),
        json!({
            "file_content": "class A{}",
            "config_options": { "tsfmt": true, "tsfmtFile": "tsfmt.json", "tslint": false }
        }),
    )
    .await;

    // THEN
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "class A {}\n");
    let seen = engine.seen.lock().expect("lock");
    let (file_name, options) = &seen[0];
    assert_eq!(file_name, "format-input.ts");
    assert_eq!(options.tslint, Some(false));
    assert_eq!(options.tsfmt_file.as_deref().map(|p| p.to_string_lossy().to_string()), Some("tsfmt.json".to_string()));
}

#[tokio::test]
async fn given_unknown_ts_option_when_formatting_then_400_and_engine_not_called() {
    let engine = Arc::new(FakeTsFmtEngine::new(TsFmtBehaviour::Return(
        TsFmtResult::formatted(""),
    )));
    let test = start(tsfmt(&engine)).await;

    let response = post_json(
        &test.url("/tsfmt/format"),
        json!({ "file_content": "x", "config_options": { "indentSize": "four" } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(engine.seen.lock().expect("lock").is_empty());
}
