// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake content source for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ContentError, ContentRequest, ContentSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    requests: Vec<ContentRequest>,
    failures: VecDeque<bool>,
}

/// Content source producing `post #<sequence>`, with scriptable failures
#[derive(Clone, Default)]
pub struct FakeContentSource {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `n` generate calls
    pub fn fail_next(&self, n: usize) {
        self.state().failures.extend(std::iter::repeat_n(true, n));
    }

    /// Get all recorded requests
    pub fn requests(&self) -> Vec<ContentRequest> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl ContentSource for FakeContentSource {
    async fn generate(&self, request: &ContentRequest) -> Result<String, ContentError> {
        let mut state = self.state();
        state.requests.push(request.clone());
        if state.failures.pop_front().unwrap_or(false) {
            return Err(ContentError::Unavailable("injected failure".to_string()));
        }
        Ok(format!("post #{}", request.sequence))
    }
}
