// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator view of workers, materialized from WAL replay

use chrono::{DateTime, Utc};
use pb_core::{Operation, WorkerStatus};
use std::collections::HashMap;

/// Last known state of one agent's worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub agent_id: String,
    pub status: WorkerStatus,
    pub error: Option<String>,
    pub status_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    /// A running worker whose last sign of life is older than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        if self.status != WorkerStatus::Running {
            return false;
        }
        let last_seen = self.last_heartbeat.unwrap_or(self.status_at).max(self.status_at);
        now - last_seen > max_age
    }
}

/// State built from status log operations
#[derive(Debug, Default)]
pub struct CoordinatorState {
    pub workers: HashMap<String, WorkerRecord>,
    /// Tenant id -> time credentials were last saved
    pub credentials_saved: HashMap<String, DateTime<Utc>>,
}

impl CoordinatorState {
    /// Rebuild state from a full replay
    pub fn from_operations<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    pub fn worker(&self, agent_id: &str) -> Option<&WorkerRecord> {
        self.workers.get(agent_id)
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::WorkerStatusChanged {
                agent_id,
                status,
                error,
                at,
            } => {
                let record = self
                    .workers
                    .entry(agent_id.clone())
                    .or_insert_with(|| WorkerRecord {
                        agent_id: agent_id.clone(),
                        status: *status,
                        error: None,
                        status_at: *at,
                        last_heartbeat: None,
                    });
                // A restarted worker begins at Initializing again
                if *status == WorkerStatus::Initializing {
                    record.last_heartbeat = None;
                }
                record.status = *status;
                record.error = error.clone();
                record.status_at = *at;
            }

            Operation::WorkerHeartbeat { agent_id, at } => {
                // Heartbeats for unknown workers are dropped; status comes first
                if let Some(record) = self.workers.get_mut(agent_id) {
                    record.last_heartbeat = Some(*at);
                }
            }

            Operation::CredentialsSaved { tenant_id, at, .. } => {
                self.credentials_saved.insert(tenant_id.clone(), *at);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
