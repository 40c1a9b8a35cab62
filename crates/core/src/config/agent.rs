// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent worker configuration, loaded from TOML once at startup
//!
//! ```toml
//! agent_id = "agent-42"
//! tenant_id = "tenant-7"
//! handle = "release_notes"
//!
//! [schedule]
//! mode = "daily"
//! times = ["09:00", "13:00", "17:00"]
//!
//! [content]
//! topics = ["rust tips"]
//!
//! [timing]
//! delivery_backoff = "60s"
//! ```

use crate::credential::LoginCredentials;
use crate::recurrence::RecurrenceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("invalid agent config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid agent config: {0}")]
    Invalid(String),
}

/// Everything a worker needs to know about its agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub tenant_id: String,
    /// Platform handle the agent posts as
    pub handle: String,
    #[serde(default)]
    pub schedule: RecurrenceConfig,
    #[serde(default)]
    pub content: ContentConfig,
    /// Credential extraction helper; stage two of the cascade is skipped without it
    #[serde(default)]
    pub helper: Option<HelperConfig>,
    /// Fallback interactive login; stage three is skipped without it
    #[serde(default)]
    pub login: Option<LoginCredentials>,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl AgentConfig {
    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_id("agent_id", &self.agent_id)?;
        validate_id("tenant_id", &self.tenant_id)?;
        if self.handle.trim().is_empty() {
            return Err(ConfigError::Invalid("handle must not be empty".to_string()));
        }
        if let Some(login) = &self.login {
            if login.username.is_empty() {
                return Err(ConfigError::Invalid(
                    "login.username must not be empty".to_string(),
                ));
            }
        }
        if self.timing.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "timing.heartbeat_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ids end up in file and directory names, so keep them path-safe
fn validate_id(field: &str, value: &str) -> Result<(), ConfigError> {
    let ok = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !value.starts_with('-');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} {:?} must be 1-64 chars of [A-Za-z0-9_-]",
            field, value
        )))
    }
}

/// Content generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Post templates; rendered with `agent`, `handle`, `topic`, `date`, `sequence`
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Posts longer than this are truncated on a word boundary
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_templates() -> Vec<String> {
    vec!["{{ topic }}".to_string()]
}

fn default_max_length() -> usize {
    280
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            topics: Vec::new(),
            max_length: default_max_length(),
        }
    }
}

/// External credential extraction helper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    pub program: PathBuf,
    /// Arguments placed before the handle/workdir/output triple
    #[serde(default)]
    pub args: Vec<String>,
}

/// Platform endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Run the full pipeline but never call the platform
    #[serde(default)]
    pub dry_run: bool,
}

fn default_base_url() -> String {
    "https://x.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            dry_run: false,
        }
    }
}

/// Timing knobs; the defaults are the long-standing production values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_heartbeat", with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Wait after a failed delivery before re-arming
    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub delivery_backoff: Duration,
    #[serde(default = "default_helper_timeout", with = "humantime_serde")]
    pub helper_timeout: Duration,
    /// Hard limit on graceful shutdown
    #[serde(default = "default_shutdown_deadline", with = "humantime_serde")]
    pub shutdown_deadline: Duration,
}

fn default_heartbeat() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff() -> Duration {
    Duration::from_secs(60)
}

fn default_helper_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_shutdown_deadline() -> Duration {
    Duration::from_secs(5)
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat(),
            delivery_backoff: default_backoff(),
            helper_timeout: default_helper_timeout(),
            shutdown_deadline: default_shutdown_deadline(),
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
