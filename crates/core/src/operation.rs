// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations recorded in the coordinator's status log

use crate::WorkerStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// A worker moved to a new lifecycle state
    WorkerStatusChanged {
        agent_id: String,
        status: WorkerStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        at: DateTime<Utc>,
    },

    /// Liveness ping from a running worker
    WorkerHeartbeat { agent_id: String, at: DateTime<Utc> },

    /// A freshly verified credential set was stored for a tenant
    CredentialsSaved {
        tenant_id: String,
        count: usize,
        at: DateTime<Utc>,
    },
}

impl Operation {
    /// Agent this operation concerns, if any
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Operation::WorkerStatusChanged { agent_id, .. }
            | Operation::WorkerHeartbeat { agent_id, .. } => Some(agent_id),
            Operation::CredentialsSaved { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
