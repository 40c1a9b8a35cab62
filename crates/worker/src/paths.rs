// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout and environment for one worker process

use crate::lifecycle::LifecycleError;
use pb_core::AgentConfig;
use std::path::{Path, PathBuf};

/// Overrides the state directory
pub const STATE_DIR_ENV: &str = "PB_STATE_DIR";
/// Agent config path when none is given on the command line
pub const AGENT_CONFIG_ENV: &str = "PB_AGENT_CONFIG";
/// Overrides `login.password` so it can stay out of the config file
pub const LOGIN_PASSWORD_ENV: &str = "PB_LOGIN_PASSWORD";
/// Agent to report against when the config itself cannot be loaded
pub const AGENT_ID_ENV: &str = "PB_AGENT_ID";

/// Paths used by the worker for one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPaths {
    pub state_dir: PathBuf,
    /// Per-agent directory
    pub agent_dir: PathBuf,
    /// Lock/PID file
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    /// Root for helper working directories
    pub helper_root: PathBuf,
    /// Shared per-tenant credential documents
    pub credentials_dir: PathBuf,
    /// Shared coordinator status log
    pub wal_path: PathBuf,
    /// Shared per-agent status snapshots
    pub snapshot_dir: PathBuf,
}

impl WorkerPaths {
    /// Paths for an agent under the state directory from the environment
    pub fn for_agent(agent_id: &str) -> Result<Self, LifecycleError> {
        Ok(Self::under(&state_dir()?, agent_id))
    }

    pub fn under(state_dir: &Path, agent_id: &str) -> Self {
        let agent_dir = state_dir.join("agents").join(agent_id);
        Self {
            state_dir: state_dir.to_path_buf(),
            lock_path: agent_dir.join("worker.pid"),
            log_path: agent_dir.join("worker.log"),
            helper_root: agent_dir.join("helpers"),
            credentials_dir: state_dir.join("credentials"),
            wal_path: state_dir.join("wal").join("status.wal"),
            snapshot_dir: state_dir.join("status"),
            agent_dir,
        }
    }
}

/// Get the state directory for postbot
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("postbot"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/postbot"))
}

/// Agent config path: first argument, else `PB_AGENT_CONFIG`
pub fn config_path(args: &[String]) -> Result<PathBuf, LifecycleError> {
    if let Some(path) = args.get(1) {
        return Ok(PathBuf::from(path));
    }
    std::env::var(AGENT_CONFIG_ENV)
        .map(PathBuf::from)
        .map_err(|_| LifecycleError::NoAgentConfig)
}

/// Load the agent config and apply environment overrides
pub fn load_agent_config(path: &Path) -> Result<AgentConfig, LifecycleError> {
    let mut config = AgentConfig::load(path)?;
    if let Ok(password) = std::env::var(LOGIN_PASSWORD_ENV) {
        apply_password_override(&mut config, password);
    }
    Ok(config)
}

fn apply_password_override(config: &mut AgentConfig, password: String) {
    match &mut config.login {
        Some(login) => login.password = password,
        None => tracing::warn!("{} set but no [login] section configured", LOGIN_PASSWORD_ENV),
    }
}
