// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake credential store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CredentialStore, StoreError};
use async_trait::async_trait;
use pb_core::CredentialSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Load { tenant_id: String },
    Upsert { tenant_id: String, count: usize },
}

#[derive(Default)]
struct FakeState {
    sets: HashMap<String, CredentialSet>,
    calls: Vec<StoreCall>,
    fail_upsert: bool,
}

/// In-memory credential store for testing
#[derive(Clone, Default)]
pub struct FakeCredentialStore {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed stored credentials for a tenant
    pub fn insert(&self, tenant_id: &str, credentials: CredentialSet) {
        self.state().sets.insert(tenant_id.to_string(), credentials);
    }

    /// Make every upsert fail
    pub fn set_fail_upsert(&self, fail: bool) {
        self.state().fail_upsert = fail;
    }

    pub fn stored(&self, tenant_id: &str) -> Option<CredentialSet> {
        self.state().sets.get(tenant_id).cloned()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn upsert_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Upsert { .. }))
            .count()
    }
}

#[async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn load(&self, tenant_id: &str) -> Result<Option<CredentialSet>, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Load {
            tenant_id: tenant_id.to_string(),
        });
        Ok(state.sets.get(tenant_id).cloned())
    }

    async fn upsert(
        &self,
        tenant_id: &str,
        credentials: &CredentialSet,
    ) -> Result<usize, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Upsert {
            tenant_id: tenant_id.to_string(),
            count: credentials.len(),
        });
        if state.fail_upsert {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        let stored = state.sets.entry(tenant_id.to_string()).or_default();
        for cookie in credentials.cookies() {
            stored.insert(cookie.clone());
        }
        Ok(stored.len())
    }
}
