// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for workers: credential files, the status WAL and
//! per-agent status snapshots

mod atomic;
mod credentials;
mod snapshot;
mod state;
mod wal;

pub use credentials::{CredentialEntry, CredentialFile, CredentialFileError};
pub use snapshot::{SnapshotError, SnapshotStore, WorkerSnapshot};
pub use state::{CoordinatorState, WorkerRecord};
pub use wal::{LogFile, Wal, WalError};
