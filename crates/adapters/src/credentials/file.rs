// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{CredentialStore, StoreError};
use async_trait::async_trait;
use pb_core::{Clock, CredentialSet, SystemClock};
use pb_storage::{CredentialFile, CredentialFileError};
use std::path::PathBuf;

/// Credential store backed by per-tenant JSON documents
#[derive(Clone)]
pub struct FileCredentialStore<C: Clock = SystemClock> {
    file: CredentialFile,
    clock: C,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> FileCredentialStore<C> {
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            file: CredentialFile::new(root),
            clock,
        }
    }
}

impl From<CredentialFileError> for StoreError {
    fn from(err: CredentialFileError) -> Self {
        match err {
            CredentialFileError::Io(..) => StoreError::Unavailable(err.to_string()),
            CredentialFileError::Json(..) => StoreError::Corrupt(err.to_string()),
        }
    }
}

#[async_trait]
impl<C: Clock> CredentialStore for FileCredentialStore<C> {
    async fn load(&self, tenant_id: &str) -> Result<Option<CredentialSet>, StoreError> {
        Ok(self.file.load(tenant_id)?)
    }

    async fn upsert(
        &self,
        tenant_id: &str,
        credentials: &CredentialSet,
    ) -> Result<usize, StoreError> {
        Ok(self
            .file
            .upsert(tenant_id, credentials, self.clock.utc_now())?)
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
