// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurrence rules and next-fire-time computation
//!
//! Everything here is a pure function of `(config, now)`. Times are UTC;
//! the configured timezone is carried for display only.

use chrono::{DateTime, Days, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Delay used whenever a fire time cannot be computed from the config
pub const FALLBACK_DELAY: Duration = Duration::from_secs(60 * 60);

/// How often an agent posts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceMode {
    /// At the top of every hour
    #[default]
    Hourly,
    /// At fixed times of day
    Daily,
    /// Every `custom_interval` minutes
    Custom,
}

impl fmt::Display for RecurrenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceMode::Hourly => write!(f, "hourly"),
            RecurrenceMode::Daily => write!(f, "daily"),
            RecurrenceMode::Custom => write!(f, "custom"),
        }
    }
}

/// Posting schedule for one agent
///
/// Slots are kept as written (`"09:00"`) and parsed on every computation so
/// that a bad slot degrades to the fallback delay instead of failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    #[serde(default)]
    pub mode: RecurrenceMode,
    #[serde(default)]
    pub times: Vec<String>,
    /// Minutes between posts in custom mode
    #[serde(default)]
    pub custom_interval: Option<u32>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self::hourly()
    }
}

impl RecurrenceConfig {
    pub fn hourly() -> Self {
        Self {
            mode: RecurrenceMode::Hourly,
            times: Vec::new(),
            custom_interval: None,
            timezone: default_timezone(),
        }
    }

    pub fn daily<S: Into<String>>(times: impl IntoIterator<Item = S>) -> Self {
        Self {
            mode: RecurrenceMode::Daily,
            times: times.into_iter().map(Into::into).collect(),
            ..Self::hourly()
        }
    }

    pub fn custom(minutes: u32) -> Self {
        Self {
            mode: RecurrenceMode::Custom,
            custom_interval: Some(minutes),
            ..Self::hourly()
        }
    }
}

/// Why a fire time could not be computed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("daily schedule has no time slots")]
    NoTimeSlots,
    #[error("invalid time slot {0:?} (expected HH:MM)")]
    InvalidTimeSlot(String),
    #[error("custom schedule needs a positive interval")]
    MissingInterval,
    #[error("fire time out of range")]
    OutOfRange,
}

/// A time of day, minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot {
    pub hour: u32,
    pub minute: u32,
}

impl TimeSlot {
    pub fn parse(s: &str) -> Result<Self, RecurrenceError> {
        let invalid = || RecurrenceError::InvalidTimeSlot(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }

    fn as_time(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Compute the next fire time, falling back to `now + 1h` on any error
pub fn next_fire_time(config: &RecurrenceConfig, now: DateTime<Utc>) -> DateTime<Utc> {
    match try_next_fire_time(config, now) {
        Ok(at) => at,
        Err(e) => {
            tracing::warn!(mode = %config.mode, error = %e, "schedule fallback: one hour ahead");
            now + TimeDelta::seconds(FALLBACK_DELAY.as_secs() as i64)
        }
    }
}

/// Compute the next fire time strictly after `now`
pub fn try_next_fire_time(
    config: &RecurrenceConfig,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecurrenceError> {
    match config.mode {
        RecurrenceMode::Hourly => next_hour(now),
        RecurrenceMode::Daily => next_daily_slot(&config.times, now),
        RecurrenceMode::Custom => {
            let minutes = config
                .custom_interval
                .filter(|m| *m > 0)
                .ok_or(RecurrenceError::MissingInterval)?;
            now.checked_add_signed(TimeDelta::minutes(i64::from(minutes)))
                .ok_or(RecurrenceError::OutOfRange)
        }
    }
}

fn next_hour(now: DateTime<Utc>) -> Result<DateTime<Utc>, RecurrenceError> {
    let top = now
        .date_naive()
        .and_hms_opt(now.hour(), 0, 0)
        .ok_or(RecurrenceError::OutOfRange)?
        .and_utc();
    top.checked_add_signed(TimeDelta::hours(1))
        .ok_or(RecurrenceError::OutOfRange)
}

fn next_daily_slot(times: &[String], now: DateTime<Utc>) -> Result<DateTime<Utc>, RecurrenceError> {
    let mut slots = times
        .iter()
        .map(|t| TimeSlot::parse(t))
        .collect::<Result<Vec<_>, _>>()?;
    slots.sort();
    slots.dedup();

    let today = now.date_naive();
    for slot in &slots {
        let time = slot.as_time().ok_or(RecurrenceError::OutOfRange)?;
        let candidate = today.and_time(time).and_utc();
        if candidate > now {
            return Ok(candidate);
        }
    }

    let first = slots.first().ok_or(RecurrenceError::NoTimeSlots)?;
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or(RecurrenceError::OutOfRange)?;
    let time = first.as_time().ok_or(RecurrenceError::OutOfRange)?;
    Ok(tomorrow.and_time(time).and_utc())
}

#[cfg(test)]
#[path = "recurrence_tests.rs"]
mod tests;
