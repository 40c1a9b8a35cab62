// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session verification, login, and publishing against the posting platform

mod http;
mod noop;

pub use http::HttpPlatformAdapter;
pub use noop::NoOpPlatformAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePlatformAdapter, PlatformCall, PublishBehavior};

use async_trait::async_trait;
use pb_core::{CredentialSet, LoginCredentials, PublishedPost};
use thiserror::Error;

/// Errors from platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("session rejected")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A piece of content ready to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Scheduled action that produced this post
    pub action_id: String,
    pub text: String,
}

impl Post {
    pub fn new(action_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: text.into(),
        }
    }
}

/// Adapter for the posting platform's session and publish API
#[async_trait]
pub trait PlatformAdapter: Clone + Send + Sync + 'static {
    /// Check whether the credentials still carry a live session.
    ///
    /// `Ok(false)` means the platform rejected the session; `Err` means the
    /// check itself could not be completed.
    async fn verify_session(&self, credentials: &CredentialSet) -> Result<bool, PlatformError>;

    /// Log in with username and password, returning the new session
    async fn login(&self, login: &LoginCredentials) -> Result<CredentialSet, PlatformError>;

    /// Publish a post under the given session
    async fn publish(
        &self,
        credentials: &CredentialSet,
        post: &Post,
    ) -> Result<PublishedPost, PlatformError>;
}
