// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session credentials for the posting platform
//!
//! A [`CredentialSet`] is a typed bag of session cookies. Turning it into a
//! wire format is the job of a [`CredentialEncoder`], so resolution code
//! never builds header strings by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// None for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

/// Cookies that authenticate platform calls for one tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSet {
    cookies: Vec<SessionCookie>,
}

impl CredentialSet {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        let mut set = Self::default();
        for cookie in cookies {
            set.insert(cookie);
        }
        set
    }

    /// Add a cookie, replacing any existing cookie with the same name
    pub fn insert(&mut self, cookie: SessionCookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SessionCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Drop cookies that expired at or before `now`, returning how many went
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|c| !c.is_expired(now));
        before - self.cookies.len()
    }

    /// Parse the helper's output artifact
    ///
    /// Accepts a bare array of cookies or `{"cookies": [...]}`, using the
    /// field names browsers export (`httpOnly`, `expirationDate`, ...).
    /// Expiry values are unix seconds; zero or negative marks a session cookie.
    pub fn from_export_json(json: &str) -> Result<Self, CredentialParseError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Export {
            Bare(Vec<ExportedCookie>),
            Wrapped { cookies: Vec<ExportedCookie> },
        }

        let exported = match serde_json::from_str::<Export>(json)? {
            Export::Bare(cookies) | Export::Wrapped { cookies } => cookies,
        };

        let mut set = CredentialSet::default();
        for cookie in exported {
            if cookie.name.is_empty() {
                return Err(CredentialParseError::MissingName);
            }
            set.insert(cookie.into_session_cookie());
        }
        Ok(set)
    }
}

/// Errors parsing an exported cookie file
#[derive(Debug, Error)]
pub enum CredentialParseError {
    #[error("invalid cookie export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cookie without a name")]
    MissingName,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default, alias = "expirationDate")]
    expires: Option<f64>,
    #[serde(default)]
    http_only: bool,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    same_site: Option<String>,
}

impl ExportedCookie {
    fn into_session_cookie(self) -> SessionCookie {
        let expires = self
            .expires
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0));
        SessionCookie {
            name: self.name,
            value: self.value,
            domain: self.domain,
            path: self.path,
            expires,
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site,
        }
    }
}

/// Serializes a credential set into a transport format
pub trait CredentialEncoder: Send + Sync {
    /// Header name the encoded value belongs in
    fn header_name(&self) -> &'static str;

    fn encode(&self, credentials: &CredentialSet) -> String;
}

/// Encodes cookies as a `Cookie:` request header value
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieHeaderEncoder;

impl CredentialEncoder for CookieHeaderEncoder {
    fn header_name(&self) -> &'static str {
        "Cookie"
    }

    fn encode(&self, credentials: &CredentialSet) -> String {
        credentials
            .cookies()
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Username/password pair for the interactive login stage
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
