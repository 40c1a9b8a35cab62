// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O

pub mod content;
pub mod credentials;
pub mod platform;
pub mod status;
pub mod traced;

pub use content::{ContentError, ContentRequest, ContentSource, TemplateContentSource};
pub use credentials::{CredentialStore, FileCredentialStore, StoreError};
pub use platform::{HttpPlatformAdapter, NoOpPlatformAdapter, PlatformAdapter, PlatformError, Post};
pub use status::{SinkError, StatusSink, WalStatusSink};
pub use traced::{TracedPlatformAdapter, TracedStatusSink};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use content::FakeContentSource;
#[cfg(any(test, feature = "test-support"))]
pub use credentials::{FakeCredentialStore, StoreCall};
#[cfg(any(test, feature = "test-support"))]
pub use platform::{FakePlatformAdapter, PlatformCall, PublishBehavior};
#[cfg(any(test, feature = "test-support"))]
pub use status::{FakeStatusSink, SinkCall};
