//! Config loading specs
//!
//! A worker that cannot load its config exits 1 before doing anything else.

use crate::prelude::*;

#[test]
fn missing_config_path_fails() {
    let ws = Workspace::new();

    ws.pbw().fails().stderr_has("no agent config given");
}

#[test]
fn unreadable_config_file_fails() {
    let ws = Workspace::new();

    ws.pbw_with_config().fails().stderr_has("failed to read");
}

#[test]
fn invalid_agent_id_is_rejected() {
    let ws = Workspace::new();
    ws.write_config(
        r#"
agent_id = "../escape"
tenant_id = "tenant-a"
handle = "poster"
"#,
    );

    ws.pbw_with_config()
        .fails()
        .stderr_has("invalid agent config");
}

#[test]
fn config_failure_is_reported_against_agent_id_from_env() {
    let ws = Workspace::new();
    ws.write_config("agent_id = ");

    ws.pbw_with_config().env("PB_AGENT_ID", "agent-9").fails();

    let snapshot = ws.snapshot("agent-9");
    similar_asserts::assert_eq!(snapshot["status"], "error");
    assert!(snapshot["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid agent config"));
}

#[test]
fn broken_template_fails_startup_with_error_status() {
    let ws = Workspace::new();
    ws.write_config(&format!(
        "{}\n[content]\ntemplates = [\"{{{{ topic\"]\n",
        BASIC_CONFIG
    ));

    ws.pbw_with_config().fails();

    let snapshot = ws.snapshot("agent-1");
    similar_asserts::assert_eq!(snapshot["status"], "error");
    assert!(snapshot["error"]
        .as_str()
        .unwrap()
        .starts_with("content setup failed"));
}
