// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented control channel on stdin

use serde::Serialize;
use std::io::BufRead;
use std::str::FromStr;
use tokio::sync::mpsc;

/// Instruction read from one stdin line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Shutdown,
    Status,
    Ping,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shutdown" | "stop" => Ok(ControlCommand::Shutdown),
            "status" => Ok(ControlCommand::Status),
            "ping" => Ok(ControlCommand::Ping),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

/// One-line JSON answer to `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub agent_id: String,
    pub status: pb_core::WorkerStatus,
    pub fires: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_fire: Option<String>,
    pub uptime_secs: u64,
}

/// Forward input lines to the runtime from a plain thread.
///
/// A blocking read inside the runtime would hold up its shutdown while
/// nobody types. The channel closes at end of input.
pub fn spawn_line_reader<R>(input: R) -> mpsc::UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
