// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent per-tenant credential storage

mod file;

pub use file::FileCredentialStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCredentialStore, StoreCall};

use async_trait::async_trait;
use pb_core::CredentialSet;
use thiserror::Error;

/// Errors from credential storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored credentials are corrupt: {0}")]
    Corrupt(String),
}

/// Adapter for the tenant credential store
#[async_trait]
pub trait CredentialStore: Clone + Send + Sync + 'static {
    /// Stored credentials for a tenant; `None` when nothing is stored
    async fn load(&self, tenant_id: &str) -> Result<Option<CredentialSet>, StoreError>;

    /// Merge credentials into the tenant's stored set, keyed by cookie name.
    /// Returns the number of entries now stored.
    async fn upsert(&self, tenant_id: &str, credentials: &CredentialSet)
        -> Result<usize, StoreError>;
}
