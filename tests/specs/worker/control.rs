//! Control channel specs
//!
//! A dry-run worker with a stored session starts without touching the
//! network, answers stdin commands and stops cleanly on `shutdown`.

use crate::prelude::*;

fn dry_run_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write_config(&format!("{}dry_run = true\n", BASIC_CONFIG));
    ws.store_session("tenant-a", "stored-token");
    ws
}

#[test]
fn shutdown_on_stdin_exits_cleanly() {
    let ws = dry_run_workspace();

    ws.pbw_with_config().stdin("shutdown\n").passes();

    let snapshot = ws.snapshot("agent-1");
    similar_asserts::assert_eq!(snapshot["status"], "stopped");
    assert!(!ws.lock_path("agent-1").exists());
}

#[test]
fn ping_and_status_are_answered_before_shutdown() {
    let ws = dry_run_workspace();

    let out = ws
        .pbw_with_config()
        .stdin("ping\nstatus\nshutdown\n")
        .passes();

    let lines = out.stdout_lines();
    similar_asserts::assert_eq!(lines[0], "READY");
    similar_asserts::assert_eq!(lines[1], "pong");
    let status: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    similar_asserts::assert_eq!(status["agent_id"], "agent-1");
    similar_asserts::assert_eq!(status["status"], "running");
    similar_asserts::assert_eq!(status["fires"], 0);
}

#[test]
fn unknown_commands_are_ignored() {
    let ws = dry_run_workspace();

    ws.pbw_with_config()
        .stdin("reboot\n\nshutdown\n")
        .passes()
        .stdout_has("READY");
}
