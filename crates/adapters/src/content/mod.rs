// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post content generation

mod template;

pub use template::TemplateContentSource;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeContentSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from content generation
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("template error: {0}")]
    Template(String),
    #[error("generated content is empty")]
    Empty,
    #[error("content source unavailable: {0}")]
    Unavailable(String),
}

/// What the scheduler knows when it asks for a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub agent_id: String,
    pub handle: String,
    /// Number of fires before this one
    pub sequence: u64,
    pub at: DateTime<Utc>,
}

/// Adapter producing the text of the next post
#[async_trait]
pub trait ContentSource: Clone + Send + Sync + 'static {
    async fn generate(&self, request: &ContentRequest) -> Result<String, ContentError>;
}
