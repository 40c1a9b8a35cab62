// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker status and liveness reporting to the coordinator

mod wal;

pub use wal::WalStatusSink;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStatusSink, SinkCall};

use async_trait::async_trait;
use pb_core::WorkerStatus;
use thiserror::Error;

/// Errors from the status sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("status log write failed: {0}")]
    Log(String),
    #[error("snapshot write failed: {0}")]
    Snapshot(String),
}

/// Adapter for the coordinator's status store
#[async_trait]
pub trait StatusSink: Clone + Send + Sync + 'static {
    /// Record a lifecycle transition, with the failure reason for `Error`
    async fn report(
        &self,
        agent_id: &str,
        status: WorkerStatus,
        error: Option<&str>,
    ) -> Result<(), SinkError>;

    /// Liveness ping through the primary (batched log) path
    async fn heartbeat(&self, agent_id: &str) -> Result<(), SinkError>;

    /// Liveness ping written straight to the agent's snapshot
    async fn heartbeat_direct(&self, agent_id: &str) -> Result<(), SinkError>;

    /// Note that a tenant's credentials were refreshed and stored
    async fn credentials_saved(&self, tenant_id: &str, count: usize) -> Result<(), SinkError>;

    /// Write out anything still queued
    async fn flush(&self) -> Result<(), SinkError>;
}
