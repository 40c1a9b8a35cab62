// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pb-core: Core types for the postbot agent worker
//!
//! This crate provides:
//! - Worker status state machine
//! - Recurrence rules and pure next-fire-time computation
//! - Typed session credentials and their transport encoding
//! - Agent configuration
//! - Status-log operations persisted by the coordinator store

pub mod clock;
pub mod id;

pub mod action;
pub mod config;
pub mod credential;
pub mod operation;
pub mod recurrence;
pub mod status;

// Re-exports
pub use action::{DeliveryResult, PublishedPost, ScheduledAction};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    AgentConfig, ConfigError, ContentConfig, HelperConfig, PlatformConfig, TimingConfig,
};
pub use credential::{
    CookieHeaderEncoder, CredentialEncoder, CredentialParseError, CredentialSet,
    LoginCredentials, SessionCookie,
};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use operation::Operation;
pub use recurrence::{
    next_fire_time, try_next_fire_time, RecurrenceConfig, RecurrenceError, RecurrenceMode,
    TimeSlot,
};
pub use status::{StatusMachine, WorkerStatus};
