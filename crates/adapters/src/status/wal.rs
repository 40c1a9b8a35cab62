// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status sink over the shared WAL plus per-agent snapshots
//!
//! Operations are queued and appended in one batch. A failed append leaves
//! the queue intact so the next write retries it; queued heartbeats collapse
//! to the latest one per agent. Status changes also update
//! the agent's snapshot, which is the fallback path for heartbeats.

use super::{SinkError, StatusSink};
use async_trait::async_trait;
use pb_core::{Clock, Operation, SystemClock, WorkerStatus};
use pb_storage::{SnapshotStore, Wal, WorkerSnapshot};
use std::path::Path;
use std::sync::{Arc, Mutex};

struct LogState {
    wal: Wal,
    pending: Vec<Operation>,
}

/// Queue an operation behind a failing log. Only the latest heartbeat per
/// agent is kept, so an outage does not grow the queue every interval.
fn queue(pending: &mut Vec<Operation>, op: Operation) {
    if let Operation::WorkerHeartbeat { agent_id, .. } = &op {
        pending.retain(|queued| match queued {
            Operation::WorkerHeartbeat {
                agent_id: queued_id,
                ..
            } => queued_id != agent_id,
            _ => true,
        });
    }
    pending.push(op);
}

/// Status sink writing to the coordinator WAL and snapshot directory
#[derive(Clone)]
pub struct WalStatusSink<C: Clock = SystemClock> {
    log: Arc<Mutex<LogState>>,
    snapshots: SnapshotStore,
    pid: u32,
    clock: C,
}

impl WalStatusSink {
    pub fn open(wal_path: &Path, snapshot_dir: &Path) -> Result<Self, SinkError> {
        Self::with_clock(wal_path, snapshot_dir, std::process::id(), SystemClock)
    }
}

impl<C: Clock> WalStatusSink<C> {
    pub fn with_clock(
        wal_path: &Path,
        snapshot_dir: &Path,
        pid: u32,
        clock: C,
    ) -> Result<Self, SinkError> {
        let wal = Wal::open(wal_path).map_err(|e| SinkError::Log(e.to_string()))?;
        std::fs::create_dir_all(snapshot_dir).map_err(|e| SinkError::Snapshot(e.to_string()))?;
        Ok(Self {
            log: Arc::new(Mutex::new(LogState {
                wal,
                pending: Vec::new(),
            })),
            snapshots: SnapshotStore::new(snapshot_dir),
            pid,
            clock,
        })
    }

    /// Queue an operation and append everything queued
    fn enqueue(&self, op: Option<Operation>) -> Result<(), SinkError> {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(op) = op {
            queue(&mut log.pending, op);
        }
        if log.pending.is_empty() {
            return Ok(());
        }
        let LogState { wal, pending } = &mut *log;
        match wal.append_batch(pending) {
            Ok(_) => {
                pending.clear();
                Ok(())
            }
            Err(e) => {
                tracing::debug!(queued = pending.len(), error = %e, "status log append failed");
                Err(SinkError::Log(e.to_string()))
            }
        }
    }

    fn update_snapshot(
        &self,
        agent_id: &str,
        f: impl FnOnce(&mut WorkerSnapshot),
    ) -> Result<(), SinkError> {
        let now = self.clock.utc_now();
        let pid = self.pid;
        self.snapshots
            .update(
                agent_id,
                || WorkerSnapshot {
                    agent_id: agent_id.to_string(),
                    status: WorkerStatus::Initializing,
                    error: None,
                    updated_at: now,
                    last_heartbeat: None,
                    pid: Some(pid),
                },
                f,
            )
            .map(|_| ())
            .map_err(|e| SinkError::Snapshot(e.to_string()))
    }
}

#[async_trait]
impl<C: Clock> StatusSink for WalStatusSink<C> {
    async fn report(
        &self,
        agent_id: &str,
        status: WorkerStatus,
        error: Option<&str>,
    ) -> Result<(), SinkError> {
        let now = self.clock.utc_now();
        let logged = self.enqueue(Some(Operation::WorkerStatusChanged {
            agent_id: agent_id.to_string(),
            status,
            error: error.map(str::to_string),
            at: now,
        }));
        let pid = self.pid;
        let snapshot = self.update_snapshot(agent_id, |s| {
            s.status = status;
            s.error = error.map(str::to_string);
            s.updated_at = now;
            s.pid = Some(pid);
            if status == WorkerStatus::Initializing {
                s.last_heartbeat = None;
            }
        });
        logged.and(snapshot)
    }

    async fn heartbeat(&self, agent_id: &str) -> Result<(), SinkError> {
        self.enqueue(Some(Operation::WorkerHeartbeat {
            agent_id: agent_id.to_string(),
            at: self.clock.utc_now(),
        }))
    }

    async fn heartbeat_direct(&self, agent_id: &str) -> Result<(), SinkError> {
        let now = self.clock.utc_now();
        self.update_snapshot(agent_id, |s| {
            s.last_heartbeat = Some(now);
            s.updated_at = now;
        })
    }

    async fn credentials_saved(&self, tenant_id: &str, count: usize) -> Result<(), SinkError> {
        self.enqueue(Some(Operation::CredentialsSaved {
            tenant_id: tenant_id.to_string(),
            count,
            at: self.clock.utc_now(),
        }))
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.enqueue(None)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
