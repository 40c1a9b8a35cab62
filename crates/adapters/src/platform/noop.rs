// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op platform adapter for dry runs

use super::{PlatformAdapter, PlatformError, Post};
use async_trait::async_trait;
use pb_core::{CredentialSet, LoginCredentials, PublishedPost};

/// Platform adapter that accepts every session and publishes nowhere.
///
/// Used by dry-run workers (`platform.dry_run = true`) to exercise the
/// schedule and content pipeline without touching the network.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpPlatformAdapter;

impl NoOpPlatformAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlatformAdapter for NoOpPlatformAdapter {
    async fn verify_session(&self, _credentials: &CredentialSet) -> Result<bool, PlatformError> {
        Ok(true)
    }

    async fn login(&self, _login: &LoginCredentials) -> Result<CredentialSet, PlatformError> {
        Ok(CredentialSet::default())
    }

    async fn publish(
        &self,
        _credentials: &CredentialSet,
        post: &Post,
    ) -> Result<PublishedPost, PlatformError> {
        tracing::info!(action_id = %post.action_id, chars = post.text.chars().count(), "dry run, not publishing");
        Ok(PublishedPost {
            id: format!("dry-run-{}", post.action_id),
            url: None,
        })
    }
}
