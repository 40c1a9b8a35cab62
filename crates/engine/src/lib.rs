// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Postbot worker engine: credential resolution, helper supervision,
//! posting schedule, delivery and heartbeats

mod delivery;
mod heartbeat;
mod resolver;
mod scheduler;
mod shutdown;
mod supervisor;

pub use delivery::DeliveryHandler;
pub use heartbeat::{beat, BeatOutcome, Heartbeat};
pub use resolver::{
    AuthError, CredentialExtractor, CredentialResolver, Resolution, Stage, StageAttempt,
    StageFailure,
};
pub use scheduler::{PostingScheduler, ScheduleHandle, ScheduleState, DEFAULT_BACKOFF};
pub use shutdown::ShutdownFlag;
pub use supervisor::{HelperSupervisor, SubprocessHandle, SESSION_ARTIFACT, TENANT_ENV};
