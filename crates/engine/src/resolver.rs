// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential resolution cascade
//!
//! Stages run in order and stop at the first verified session:
//! stored credentials, the extraction helper, then username/password login.

use async_trait::async_trait;
use pb_adapters::{CredentialStore, PlatformAdapter};
use pb_core::{Clock, CredentialSet, LoginCredentials, SystemClock};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Source of fresh credentials outside the store and login
#[async_trait]
pub trait CredentialExtractor: Send + Sync {
    /// Extract a session for the tenant; `None` on any failure
    async fn extract(&self, tenant_id: &str, handle: &str) -> Option<CredentialSet>;
}

/// A step of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Stored,
    Helper,
    Login,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Stored => write!(f, "stored"),
            Stage::Helper => write!(f, "helper"),
            Stage::Login => write!(f, "login"),
        }
    }
}

/// Why a stage did not produce a verified session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    /// The stage is not configured for this agent
    Skipped,
    /// The stage produced no credentials
    NoCredentials,
    /// The platform rejected the credentials
    Rejected,
    /// The stage or its verification errored
    Failed(String),
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageFailure::Skipped => write!(f, "not configured"),
            StageFailure::NoCredentials => write!(f, "no credentials"),
            StageFailure::Rejected => write!(f, "rejected"),
            StageFailure::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Outcome of one stage that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAttempt {
    pub stage: Stage,
    pub failure: StageFailure,
}

/// Errors from credential resolution
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication exhausted: {}", describe(.attempts))]
    Exhausted { attempts: Vec<StageAttempt> },
}

fn describe(attempts: &[StageAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} {}", a.stage, a.failure))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A verified session and where it came from
#[derive(Debug, Clone)]
pub struct Resolution {
    pub credentials: CredentialSet,
    pub stage: Stage,
    /// Stored entry count when a fresh session was persisted
    pub persisted: Option<usize>,
}

/// Walks the cascade for one tenant
pub struct CredentialResolver<S, P, C = SystemClock> {
    store: S,
    platform: P,
    extractor: Option<Arc<dyn CredentialExtractor>>,
    login: Option<LoginCredentials>,
    clock: C,
}

impl<S: CredentialStore, P: PlatformAdapter> CredentialResolver<S, P> {
    pub fn new(store: S, platform: P) -> Self {
        Self::with_clock(store, platform, SystemClock)
    }
}

impl<S: CredentialStore, P: PlatformAdapter, C: Clock> CredentialResolver<S, P, C> {
    pub fn with_clock(store: S, platform: P, clock: C) -> Self {
        Self {
            store,
            platform,
            extractor: None,
            login: None,
            clock,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn CredentialExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_login(mut self, login: Option<LoginCredentials>) -> Self {
        self.login = login;
        self
    }

    /// Resolve a verified session for the tenant
    pub async fn resolve(&self, tenant_id: &str, handle: &str) -> Result<Resolution, AuthError> {
        let mut attempts = Vec::with_capacity(3);

        match self.stored(tenant_id).await {
            Ok(credentials) => {
                tracing::info!(tenant_id, stage = %Stage::Stored, "session verified");
                return Ok(Resolution {
                    credentials,
                    stage: Stage::Stored,
                    persisted: None,
                });
            }
            Err(failure) => attempts.push(self.note(tenant_id, Stage::Stored, failure)),
        }

        match self.helper(tenant_id, handle).await {
            Ok(credentials) => return Ok(self.fresh(tenant_id, Stage::Helper, credentials).await),
            Err(failure) => attempts.push(self.note(tenant_id, Stage::Helper, failure)),
        }

        match self.interactive_login(tenant_id).await {
            Ok(credentials) => return Ok(self.fresh(tenant_id, Stage::Login, credentials).await),
            Err(failure) => attempts.push(self.note(tenant_id, Stage::Login, failure)),
        }

        Err(AuthError::Exhausted { attempts })
    }

    async fn stored(&self, tenant_id: &str) -> Result<CredentialSet, StageFailure> {
        let mut credentials = match self.store.load(tenant_id).await {
            Ok(Some(set)) => set,
            Ok(None) => return Err(StageFailure::NoCredentials),
            Err(e) => return Err(StageFailure::Failed(e.to_string())),
        };
        let pruned = credentials.prune_expired(self.clock.utc_now());
        if pruned > 0 {
            tracing::debug!(tenant_id, pruned, "dropped expired stored cookies");
        }
        if credentials.is_empty() {
            return Err(StageFailure::NoCredentials);
        }
        self.verify(credentials).await
    }

    async fn helper(&self, tenant_id: &str, handle: &str) -> Result<CredentialSet, StageFailure> {
        let Some(extractor) = &self.extractor else {
            return Err(StageFailure::Skipped);
        };
        match extractor.extract(tenant_id, handle).await {
            Some(set) if !set.is_empty() => self.verify(set).await,
            _ => Err(StageFailure::NoCredentials),
        }
    }

    async fn interactive_login(&self, tenant_id: &str) -> Result<CredentialSet, StageFailure> {
        let Some(login) = &self.login else {
            return Err(StageFailure::Skipped);
        };
        tracing::info!(tenant_id, username = %login.username, "attempting login");
        match self.platform.login(login).await {
            Ok(set) if set.is_empty() => Err(StageFailure::NoCredentials),
            Ok(set) => self.verify(set).await,
            Err(e) => Err(StageFailure::Failed(e.to_string())),
        }
    }

    /// Verification errors count as "not verified"
    async fn verify(&self, credentials: CredentialSet) -> Result<CredentialSet, StageFailure> {
        match self.platform.verify_session(&credentials).await {
            Ok(true) => Ok(credentials),
            Ok(false) => Err(StageFailure::Rejected),
            Err(e) => Err(StageFailure::Failed(e.to_string())),
        }
    }

    /// Persist a freshly verified session. Storage failures are logged only.
    async fn fresh(&self, tenant_id: &str, stage: Stage, credentials: CredentialSet) -> Resolution {
        tracing::info!(tenant_id, stage = %stage, cookies = credentials.len(), "session verified");
        let persisted = match self.store.upsert(tenant_id, &credentials).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "failed to persist refreshed credentials");
                None
            }
        };
        Resolution {
            credentials,
            stage,
            persisted,
        }
    }

    fn note(&self, tenant_id: &str, stage: Stage, failure: StageFailure) -> StageAttempt {
        tracing::info!(tenant_id, stage = %stage, outcome = %failure, "credential stage did not verify");
        StageAttempt { stage, failure }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
