// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake platform adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{PlatformAdapter, PlatformError, Post};
use async_trait::async_trait;
use pb_core::{CredentialSet, LoginCredentials, PublishedPost};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Recorded platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    VerifySession { cookies: usize },
    Login { username: String },
    Publish { action_id: String, text: String },
}

/// Scripted outcome of one publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishBehavior {
    Succeed,
    Fail(String),
    /// Panic inside the adapter, as a buggy client library might
    Panic,
    /// Hang for this long, then succeed
    Stall(std::time::Duration),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<PlatformCall>,
    accepted_tokens: HashSet<String>,
    verify_unreachable: bool,
    login_result: Option<CredentialSet>,
    publish_script: VecDeque<PublishBehavior>,
    published: u64,
}

/// Fake platform adapter for testing
///
/// A session verifies when any of its cookie values was registered with
/// [`accept_token`](Self::accept_token). Publishing succeeds unless a
/// behavior was queued with [`script_publish`](Self::script_publish).
#[derive(Clone, Default)]
pub struct FakePlatformAdapter {
    inner: Arc<Mutex<FakeState>>,
}

impl FakePlatformAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Treat sessions carrying this cookie value as valid
    pub fn accept_token(&self, value: &str) {
        self.state().accepted_tokens.insert(value.to_string());
    }

    /// Make every verification fail as if the network were down
    pub fn set_verify_unreachable(&self, unreachable: bool) {
        self.state().verify_unreachable = unreachable;
    }

    /// Credentials returned by a successful login; `None` rejects logins
    pub fn set_login_result(&self, result: Option<CredentialSet>) {
        self.state().login_result = result;
    }

    /// Queue outcomes for upcoming publish calls
    pub fn script_publish(&self, behaviors: impl IntoIterator<Item = PublishBehavior>) {
        self.state().publish_script.extend(behaviors);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    pub fn login_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, PlatformCall::Login { .. }))
            .count()
    }

    /// Texts of every publish attempt, in order
    pub fn published_texts(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Publish { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PlatformAdapter for FakePlatformAdapter {
    async fn verify_session(&self, credentials: &CredentialSet) -> Result<bool, PlatformError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::VerifySession {
            cookies: credentials.len(),
        });
        if state.verify_unreachable {
            return Err(PlatformError::Transport("connection refused".to_string()));
        }
        Ok(credentials
            .cookies()
            .iter()
            .any(|c| state.accepted_tokens.contains(&c.value)))
    }

    async fn login(&self, login: &LoginCredentials) -> Result<CredentialSet, PlatformError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::Login {
            username: login.username.clone(),
        });
        state.login_result.clone().ok_or(PlatformError::Unauthorized)
    }

    #[allow(clippy::panic)]
    async fn publish(
        &self,
        _credentials: &CredentialSet,
        post: &Post,
    ) -> Result<PublishedPost, PlatformError> {
        let behavior = {
            let mut state = self.state();
            state.calls.push(PlatformCall::Publish {
                action_id: post.action_id.clone(),
                text: post.text.clone(),
            });
            state
                .publish_script
                .pop_front()
                .unwrap_or(PublishBehavior::Succeed)
        };
        if let PublishBehavior::Stall(duration) = behavior {
            tokio::time::sleep(duration).await;
        }
        match behavior {
            PublishBehavior::Succeed | PublishBehavior::Stall(_) => {
                let mut state = self.state();
                state.published += 1;
                let id = format!("post-{}", state.published);
                Ok(PublishedPost {
                    url: Some(format!("https://x.test/status/{}", id)),
                    id,
                })
            }
            PublishBehavior::Fail(message) => Err(PlatformError::Rejected {
                status: 500,
                message,
            }),
            PublishBehavior::Panic => panic!("fake platform panicked during publish"),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
