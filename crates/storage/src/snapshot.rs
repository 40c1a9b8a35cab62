// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent status snapshots written directly, bypassing the WAL

use crate::atomic::write_atomic;
use chrono::{DateTime, Utc};
use pb_core::WorkerStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Latest known state of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub agent_id: String,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Directory of `<agent>.json` snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, agent_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", agent_id))
    }

    pub fn read(&self, agent_id: &str) -> Result<Option<WorkerSnapshot>, SnapshotError> {
        match std::fs::read_to_string(self.path_for(agent_id)) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, snapshot: &WorkerSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path_for(&snapshot.agent_id), &json)?;
        Ok(())
    }

    /// Read-modify-write, starting from `init` if no snapshot exists
    pub fn update(
        &self,
        agent_id: &str,
        init: impl FnOnce() -> WorkerSnapshot,
        f: impl FnOnce(&mut WorkerSnapshot),
    ) -> Result<WorkerSnapshot, SnapshotError> {
        let mut snapshot = self.read(agent_id)?.unwrap_or_else(init);
        f(&mut snapshot);
        self.write(&snapshot)?;
        Ok(snapshot)
    }
}
