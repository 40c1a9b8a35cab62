// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    init_to_running = { WorkerStatus::Initializing, WorkerStatus::Running, true },
    running_to_stopping = { WorkerStatus::Running, WorkerStatus::Stopping, true },
    stopping_to_stopped = { WorkerStatus::Stopping, WorkerStatus::Stopped, true },
    init_to_stopping = { WorkerStatus::Initializing, WorkerStatus::Stopping, true },
    running_to_init = { WorkerStatus::Running, WorkerStatus::Initializing, false },
    stopped_to_running = { WorkerStatus::Stopped, WorkerStatus::Running, false },
    running_to_running = { WorkerStatus::Running, WorkerStatus::Running, false },
    error_to_running = { WorkerStatus::Error, WorkerStatus::Running, false },
    error_to_stopped = { WorkerStatus::Error, WorkerStatus::Stopped, false },
)]
fn transition_rules(from: WorkerStatus, to: WorkerStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[parameterized(
    from_initializing = { WorkerStatus::Initializing },
    from_running = { WorkerStatus::Running },
    from_stopping = { WorkerStatus::Stopping },
    from_stopped = { WorkerStatus::Stopped },
    from_error = { WorkerStatus::Error },
)]
fn error_reachable_from_any_state(from: WorkerStatus) {
    assert!(from.can_transition_to(WorkerStatus::Error));
}

#[test]
fn status_display_roundtrips_through_from_str() {
    for status in [
        WorkerStatus::Initializing,
        WorkerStatus::Running,
        WorkerStatus::Stopping,
        WorkerStatus::Stopped,
        WorkerStatus::Error,
    ] {
        let parsed: WorkerStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
    assert!("paused".parse::<WorkerStatus>().is_err());
}

#[test]
fn status_serializes_lowercase() {
    let json = serde_json::to_string(&WorkerStatus::Stopping).unwrap();
    assert_eq!(json, "\"stopping\"");
}

#[test]
fn machine_rejects_backwards_moves() {
    let mut machine = StatusMachine::new();
    assert!(machine.advance(WorkerStatus::Running));
    assert!(!machine.advance(WorkerStatus::Initializing));
    assert_eq!(machine.current(), WorkerStatus::Running);

    assert!(machine.advance(WorkerStatus::Error));
    assert!(machine.current().is_terminal());
    assert!(!machine.advance(WorkerStatus::Stopped));
}
