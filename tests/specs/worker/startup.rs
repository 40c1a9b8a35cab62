//! Startup specs
//!
//! Credential resolution gates everything: without a verified session the
//! worker reports `error` and exits 1. A shutdown signal during resolution
//! stops the worker cleanly instead.

use crate::prelude::*;

#[test]
fn exhausted_credentials_exit_with_error_status() {
    let ws = Workspace::new();
    ws.write_config(BASIC_CONFIG);

    ws.pbw_with_config().fails();

    let snapshot = ws.snapshot("agent-1");
    similar_asserts::assert_eq!(snapshot["status"], "error");
    similar_asserts::assert_eq!(
        snapshot["error"],
        "authentication exhausted: stored no credentials, helper not configured, login not configured"
    );
}

#[test]
fn startup_marker_and_error_land_in_the_log() {
    let ws = Workspace::new();
    ws.write_config(BASIC_CONFIG);

    ws.pbw_with_config().fails();

    let log = ws.log("agent-1");
    assert!(log.contains("--- pbw: starting (pid: "), "{}", log);
    assert!(
        log.contains("ERROR Failed to start worker: authentication exhausted"),
        "{}",
        log
    );
}

#[test]
fn failed_startup_releases_the_agent_lock() {
    let ws = Workspace::new();
    ws.write_config(BASIC_CONFIG);

    ws.pbw_with_config().fails();

    assert!(!ws.lock_path("agent-1").exists());
}

#[test]
fn sigterm_during_helper_run_stops_cleanly() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let ws = Workspace::new();
    let pid_file = ws.path("helper.pid");
    let helper = ws.script(
        "helper.sh",
        &format!("echo $$ > '{}'\nexec sleep 987", pid_file.display()),
    );
    ws.write_config(&format!(
        "{}\n[helper]\nprogram = '{}'\n",
        BASIC_CONFIG,
        helper.display()
    ));

    let mut pbw = ws.spawn_pbw();
    wait_for("helper to start", || {
        std::fs::read_to_string(&pid_file).is_ok_and(|s| s.ends_with('\n'))
    });
    let helper_pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    kill(Pid::from_raw(pbw.id() as i32), Signal::SIGTERM).unwrap();
    let code = wait_exit(&mut pbw);

    assert_eq!(code, Some(0), "{}", ws.log("agent-1"));
    similar_asserts::assert_eq!(ws.snapshot("agent-1")["status"], "stopped");
    assert!(!ws.lock_path("agent-1").exists());
    wait_for("helper to die", || !process_alive(helper_pid));
    let helpers = ws.state_dir().join("agents/agent-1/helpers");
    let leftover = std::fs::read_dir(helpers)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}
