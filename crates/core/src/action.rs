// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled posting actions and their delivery outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the scheduler will do next: post for `agent_id` at `fire_at`.
/// Lives only in memory; consumed when it fires or the worker stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAction {
    pub id: String,
    pub agent_id: String,
    pub fire_at: DateTime<Utc>,
}

impl ScheduledAction {
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            fire_at,
        }
    }

    /// Time left until the action fires (zero if overdue)
    pub fn delay_from(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.fire_at - now).to_std().unwrap_or_default()
    }
}

/// A post the platform accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(post: PublishedPost) -> Self {
        Self {
            success: true,
            id: Some(post.id),
            url: post.url,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}
