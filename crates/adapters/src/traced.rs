// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::platform::{PlatformAdapter, PlatformError, Post};
use crate::status::{SinkError, StatusSink};
use async_trait::async_trait;
use pb_core::{CredentialSet, LoginCredentials, PublishedPost, WorkerStatus};
use tracing::Instrument;

/// Wrapper that adds tracing to any PlatformAdapter
#[derive(Clone)]
pub struct TracedPlatformAdapter<P> {
    inner: P,
}

impl<P> TracedPlatformAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: PlatformAdapter> PlatformAdapter for TracedPlatformAdapter<P> {
    async fn verify_session(&self, credentials: &CredentialSet) -> Result<bool, PlatformError> {
        let span = tracing::info_span!("platform.verify", cookies = credentials.len());
        async {
            let start = std::time::Instant::now();
            let result = self.inner.verify_session(credentials).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(valid) => tracing::info!(valid, elapsed_ms, "session checked"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "session check failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn login(&self, login: &LoginCredentials) -> Result<CredentialSet, PlatformError> {
        let span = tracing::info_span!("platform.login", username = %login.username);
        async {
            tracing::info!("logging in");
            let start = std::time::Instant::now();
            let result = self.inner.login(login).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(set) => tracing::info!(cookies = set.len(), elapsed_ms, "logged in"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "login failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn publish(
        &self,
        credentials: &CredentialSet,
        post: &Post,
    ) -> Result<PublishedPost, PlatformError> {
        let span = tracing::info_span!("platform.publish", action_id = %post.action_id);
        async {
            // Precondition: the platform rejects empty posts with an opaque error
            if post.text.trim().is_empty() {
                tracing::error!("refusing to publish empty post");
                return Err(PlatformError::Rejected {
                    status: 0,
                    message: "empty post".to_string(),
                });
            }

            tracing::info!(chars = post.text.chars().count(), "publishing");
            let start = std::time::Instant::now();
            let result = self.inner.publish(credentials, post).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(published) => tracing::info!(
                    post_id = %published.id,
                    elapsed_ms,
                    "published"
                ),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "publish failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any StatusSink
#[derive(Clone)]
pub struct TracedStatusSink<S> {
    inner: S,
}

impl<S> TracedStatusSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: StatusSink> StatusSink for TracedStatusSink<S> {
    async fn report(
        &self,
        agent_id: &str,
        status: WorkerStatus,
        error: Option<&str>,
    ) -> Result<(), SinkError> {
        let result = self.inner.report(agent_id, status, error).await;
        match &result {
            Ok(()) => tracing::info!(agent_id, %status, reason = error, "status reported"),
            Err(e) => tracing::error!(agent_id, %status, error = %e, "status report failed"),
        }
        result
    }

    async fn heartbeat(&self, agent_id: &str) -> Result<(), SinkError> {
        let result = self.inner.heartbeat(agent_id).await;
        match &result {
            Ok(()) => tracing::trace!(agent_id, "heartbeat"),
            Err(e) => tracing::warn!(agent_id, error = %e, "heartbeat failed"),
        }
        result
    }

    async fn heartbeat_direct(&self, agent_id: &str) -> Result<(), SinkError> {
        let result = self.inner.heartbeat_direct(agent_id).await;
        match &result {
            Ok(()) => tracing::debug!(agent_id, "heartbeat written directly"),
            Err(e) => tracing::warn!(agent_id, error = %e, "direct heartbeat failed"),
        }
        result
    }

    async fn credentials_saved(&self, tenant_id: &str, count: usize) -> Result<(), SinkError> {
        let result = self.inner.credentials_saved(tenant_id, count).await;
        if let Err(e) = &result {
            tracing::warn!(tenant_id, count, error = %e, "credential save not recorded");
        }
        result
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let start = std::time::Instant::now();
        let result = self.inner.flush().await;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "status sink flushed"
        );
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
