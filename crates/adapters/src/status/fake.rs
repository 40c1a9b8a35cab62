// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake status sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{SinkError, StatusSink};
use async_trait::async_trait;
use pb_core::WorkerStatus;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Recorded sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Report {
        agent_id: String,
        status: WorkerStatus,
        error: Option<String>,
    },
    Heartbeat { agent_id: String },
    HeartbeatDirect { agent_id: String },
    CredentialsSaved { tenant_id: String, count: usize },
    Flush,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<SinkCall>,
    fail_heartbeat: bool,
    fail_direct: bool,
    fail_statuses: HashSet<WorkerStatus>,
}

/// Fake status sink for testing
#[derive(Clone, Default)]
pub struct FakeStatusSink {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the primary heartbeat path fail
    pub fn set_fail_heartbeat(&self, fail: bool) {
        self.state().fail_heartbeat = fail;
    }

    /// Make the direct heartbeat path fail
    pub fn set_fail_direct(&self, fail: bool) {
        self.state().fail_direct = fail;
    }

    /// Make reports of this status fail (the call is still recorded)
    pub fn fail_report_of(&self, status: WorkerStatus) {
        self.state().fail_statuses.insert(status);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state().calls.clone()
    }

    /// Reported statuses, in order
    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Report { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Error message of the most recent `Error` report
    pub fn last_error(&self) -> Option<String> {
        self.state().calls.iter().rev().find_map(|c| match c {
            SinkCall::Report {
                status: WorkerStatus::Error,
                error,
                ..
            } => error.clone(),
            _ => None,
        })
    }

    pub fn heartbeat_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::Heartbeat { .. }))
    }

    pub fn direct_heartbeat_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::HeartbeatDirect { .. }))
    }

    fn count(&self, pred: impl Fn(&SinkCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl StatusSink for FakeStatusSink {
    async fn report(
        &self,
        agent_id: &str,
        status: WorkerStatus,
        error: Option<&str>,
    ) -> Result<(), SinkError> {
        let mut state = self.state();
        state.calls.push(SinkCall::Report {
            agent_id: agent_id.to_string(),
            status,
            error: error.map(str::to_string),
        });
        if state.fail_statuses.contains(&status) {
            return Err(SinkError::Log(format!("injected failure reporting {}", status)));
        }
        Ok(())
    }

    async fn heartbeat(&self, agent_id: &str) -> Result<(), SinkError> {
        let mut state = self.state();
        state.calls.push(SinkCall::Heartbeat {
            agent_id: agent_id.to_string(),
        });
        if state.fail_heartbeat {
            return Err(SinkError::Log("injected heartbeat failure".to_string()));
        }
        Ok(())
    }

    async fn heartbeat_direct(&self, agent_id: &str) -> Result<(), SinkError> {
        let mut state = self.state();
        state.calls.push(SinkCall::HeartbeatDirect {
            agent_id: agent_id.to_string(),
        });
        if state.fail_direct {
            return Err(SinkError::Snapshot("injected snapshot failure".to_string()));
        }
        Ok(())
    }

    async fn credentials_saved(&self, tenant_id: &str, count: usize) -> Result<(), SinkError> {
        self.state().calls.push(SinkCall::CredentialsSaved {
            tenant_id: tenant_id.to_string(),
            count,
        });
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.state().calls.push(SinkCall::Flush);
        Ok(())
    }
}
