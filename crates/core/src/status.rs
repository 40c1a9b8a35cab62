// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle status
//!
//! A worker moves `initializing → running → stopping → stopped`. Any state
//! may move to `error`; nothing else moves backwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an agent worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Loading configuration and resolving credentials
    Initializing,
    /// Scheduler armed, heartbeats flowing
    Running,
    /// Shutdown requested, cleanup in progress
    Stopping,
    /// Cleanly shut down
    Stopped,
    /// Unrecoverable failure
    Error,
}

impl WorkerStatus {
    fn rank(self) -> u8 {
        match self {
            WorkerStatus::Initializing => 0,
            WorkerStatus::Running => 1,
            WorkerStatus::Stopping => 2,
            WorkerStatus::Stopped => 3,
            WorkerStatus::Error => 4,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: WorkerStatus) -> bool {
        if next == WorkerStatus::Error {
            return true;
        }
        if self == WorkerStatus::Error {
            return false;
        }
        next.rank() > self.rank()
    }

    /// Stopped and Error are terminal for a worker process
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Stopped | WorkerStatus::Error)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Initializing => write!(f, "initializing"),
            WorkerStatus::Running => write!(f, "running"),
            WorkerStatus::Stopping => write!(f, "stopping"),
            WorkerStatus::Stopped => write!(f, "stopped"),
            WorkerStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for WorkerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(WorkerStatus::Initializing),
            "running" => Ok(WorkerStatus::Running),
            "stopping" => Ok(WorkerStatus::Stopping),
            "stopped" => Ok(WorkerStatus::Stopped),
            "error" => Ok(WorkerStatus::Error),
            _ => Err(format!("unknown worker status: {}", s)),
        }
    }
}

/// Tracks the current status and rejects illegal transitions
#[derive(Debug, Clone)]
pub struct StatusMachine {
    current: WorkerStatus,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            current: WorkerStatus::Initializing,
        }
    }

    pub fn current(&self) -> WorkerStatus {
        self.current
    }

    /// Move to `next`, returning `false` (and staying put) if not allowed.
    /// Re-entering `error` from `error` is allowed so a later failure can
    /// replace the message.
    pub fn advance(&mut self, next: WorkerStatus) -> bool {
        if !self.current.can_transition_to(next) {
            return false;
        }
        self.current = next;
        true
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
