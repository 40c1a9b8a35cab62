// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed credential storage, one JSON document per tenant
//!
//! Entries are keyed by `(tenant, cookie name)`; upserts merge into the
//! existing document rather than replacing it.

use crate::atomic::write_atomic;
use chrono::{DateTime, Utc};
use pb_core::{CredentialSet, SessionCookie};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialFileError {
    #[error("io error on {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("corrupt credential file {0}: {1}")]
    Json(PathBuf, serde_json::Error),
}

/// One stored session entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub tenant_id: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialEntry {
    fn from_cookie(tenant_id: &str, cookie: &SessionCookie, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            key: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            expires: cookie.expires,
            http_only: cookie.http_only,
            secure: cookie.secure,
            same_site: cookie.same_site.clone(),
            updated_at: now,
        }
    }

    fn to_cookie(&self) -> SessionCookie {
        SessionCookie {
            name: self.key.clone(),
            value: self.value.clone(),
            domain: self.domain.clone(),
            path: self.path.clone(),
            expires: self.expires,
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site.clone(),
        }
    }
}

/// Directory of per-tenant credential documents
#[derive(Debug, Clone)]
pub struct CredentialFile {
    root: PathBuf,
}

impl CredentialFile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, tenant_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", tenant_id))
    }

    /// Raw entries for a tenant (empty if nothing stored)
    pub fn entries(&self, tenant_id: &str) -> Result<Vec<CredentialEntry>, CredentialFileError> {
        let path = self.path_for(tenant_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CredentialFileError::Io(path, e)),
        };
        serde_json::from_str(&content).map_err(|e| CredentialFileError::Json(path, e))
    }

    /// Stored credentials for a tenant, or `None` if nothing is stored
    pub fn load(&self, tenant_id: &str) -> Result<Option<CredentialSet>, CredentialFileError> {
        let entries = self.entries(tenant_id)?;
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(CredentialSet::new(
            entries.iter().map(CredentialEntry::to_cookie).collect(),
        )))
    }

    /// Merge `credentials` into the tenant's document, replacing entries
    /// with the same key. Returns the number of entries written.
    pub fn upsert(
        &self,
        tenant_id: &str,
        credentials: &CredentialSet,
        now: DateTime<Utc>,
    ) -> Result<usize, CredentialFileError> {
        let mut entries = self.entries(tenant_id)?;
        for cookie in credentials.cookies() {
            let entry = CredentialEntry::from_cookie(tenant_id, cookie, now);
            match entries.iter_mut().find(|e| e.key == entry.key) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        let path = self.path_for(tenant_id);
        let json = serde_json::to_vec_pretty(&entries)
            .map_err(|e| CredentialFileError::Json(path.clone(), e))?;
        write_atomic(&path, &json).map_err(|e| CredentialFileError::Io(path.clone(), e))?;
        restrict_permissions(&path);
        Ok(entries.len())
    }
}

/// Credential files hold live session tokens; keep them owner-only
fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            tracing::warn!(path = %path.display(), error = %e, "failed to restrict credential file");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
