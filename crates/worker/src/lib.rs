// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Postbot agent worker: one process per deployed agent

pub mod control;
pub mod lifecycle;
pub mod paths;

pub use control::{spawn_line_reader, ControlCommand, StatusReport};
pub use lifecycle::{
    report_fatal, startup, startup_until, AgentLock, LifecycleError, ShutdownOutcome, Started,
    Worker, WorkerDeps,
};
pub use paths::{config_path, load_agent_config, WorkerPaths, AGENT_ID_ENV};
