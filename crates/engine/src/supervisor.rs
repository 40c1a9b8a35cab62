// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision of the external credential extraction helper
//!
//! Every run gets its own working directory and process group. A run ends
//! through exactly one `settle`, whichever of exit, timeout, or shutdown
//! gets there first; the others find the handle already settled.

use crate::resolver::CredentialExtractor;
use async_trait::async_trait;
use pb_core::{CredentialSet, HelperConfig, IdGen, UuidIdGen};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Name of the artifact the helper must write into its working directory
pub const SESSION_ARTIFACT: &str = "session.json";

/// Environment variable carrying the tenant to the helper
pub const TENANT_ENV: &str = "PB_TENANT_ID";

/// Most recent helper output lines kept for diagnostics
const MAX_CAPTURED_LINES: usize = 200;

/// How long to wait for a killed helper to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// One tracked helper process
#[derive(Debug)]
pub struct SubprocessHandle {
    id: String,
    pid: Option<u32>,
    workdir: PathBuf,
    settled: AtomicBool,
    output: Mutex<VecDeque<String>>,
}

impl SubprocessHandle {
    fn new(id: String, pid: Option<u32>, workdir: PathBuf) -> Self {
        Self {
            id,
            pid,
            workdir,
            settled: AtomicBool::new(false),
            output: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Captured stdout/stderr lines, oldest first
    pub fn output(&self) -> Vec<String> {
        self.output
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn capture(&self, line: String) {
        let mut output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        if output.len() == MAX_CAPTURED_LINES {
            output.pop_front();
        }
        output.push_back(line);
    }

    /// Claim the one-shot transition to settled
    fn try_settle(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// How a settle should treat the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    /// Kill the process group, then remove the working directory
    Kill,
    /// Nothing was started; only remove the working directory
    SkipKill,
}

/// Runs the extraction helper with a hard timeout and tracks every
/// outstanding run so shutdown can sweep them.
#[derive(Clone)]
pub struct HelperSupervisor<I: IdGen = UuidIdGen> {
    helper: HelperConfig,
    work_root: PathBuf,
    timeout: Duration,
    ids: I,
    tracked: Arc<Mutex<HashMap<String, Arc<SubprocessHandle>>>>,
}

impl HelperSupervisor {
    pub fn new(helper: HelperConfig, work_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_id_gen(helper, work_root, timeout, UuidIdGen)
    }
}

impl<I: IdGen> HelperSupervisor<I> {
    pub fn with_id_gen(
        helper: HelperConfig,
        work_root: impl Into<PathBuf>,
        timeout: Duration,
        ids: I,
    ) -> Self {
        Self {
            helper,
            work_root: work_root.into(),
            timeout,
            ids,
            tracked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of helper runs not yet settled
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run the helper for a tenant and return the session it extracted.
    ///
    /// Every failure (spawn error, non-zero exit, timeout, unreadable
    /// artifact) is logged and yields `None`.
    pub async fn run_helper(&self, tenant_id: &str, handle: &str) -> Option<CredentialSet> {
        let run_id = format!("{}-{}-{}", tenant_id, unix_millis(), self.ids.next());
        let workdir = self.work_root.join(&run_id);
        if let Err(e) = std::fs::create_dir_all(&workdir) {
            tracing::warn!(tenant_id, workdir = %workdir.display(), error = %e, "cannot create helper workdir");
            return None;
        }
        let artifact = workdir.join(SESSION_ARTIFACT);

        let mut command = Command::new(&self.helper.program);
        command
            .args(&self.helper.args)
            .arg(handle)
            .arg(&workdir)
            .arg(&artifact)
            .env(TENANT_ENV, tenant_id)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    tenant_id,
                    program = %self.helper.program.display(),
                    error = %e,
                    "failed to spawn credential helper"
                );
                let handle = self.register(SubprocessHandle::new(run_id, None, workdir));
                self.settle(&handle, Settle::SkipKill);
                return None;
            }
        };

        let handle = self.register(SubprocessHandle::new(run_id, child.id(), workdir));
        tracing::info!(tenant_id, run_id = handle.id(), pid = ?handle.pid(), "credential helper started");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(capture_lines(stdout, Arc::clone(&handle)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(capture_lines(stderr, Arc::clone(&handle)));
        }

        let started = tokio::time::Instant::now();
        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(self.timeout) => None,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match status {
            None => {
                tracing::warn!(
                    tenant_id,
                    run_id = handle.id(),
                    timeout_secs = self.timeout.as_secs(),
                    "credential helper timed out, killing"
                );
                self.settle(&handle, Settle::Kill);
                let _ = tokio::time::timeout(REAP_TIMEOUT, child.wait()).await;
                None
            }
            Some(Err(e)) => {
                tracing::warn!(tenant_id, run_id = handle.id(), error = %e, "failed waiting on credential helper");
                None
            }
            Some(Ok(status)) if !status.success() => {
                tracing::warn!(
                    tenant_id,
                    run_id = handle.id(),
                    exit_code = ?status.code(),
                    elapsed_ms,
                    "credential helper failed"
                );
                None
            }
            Some(Ok(_)) => read_artifact(&artifact, tenant_id),
        };

        if result.is_none() {
            let output = handle.output();
            if !output.is_empty() {
                tracing::warn!(run_id = handle.id(), output = %output.join("\n"), "credential helper output");
            }
        } else {
            tracing::info!(tenant_id, run_id = handle.id(), elapsed_ms, "credential helper succeeded");
        }

        // The helper may have left children in its group
        self.settle(&handle, Settle::Kill);
        result
    }

    /// Settle every outstanding run, killing its process group
    pub fn shutdown_all(&self) -> usize {
        let handles: Vec<_> = self
            .tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        let mut settled = 0;
        for handle in &handles {
            if self.settle(handle, Settle::Kill) {
                settled += 1;
            }
        }
        if settled > 0 {
            tracing::info!(settled, "killed outstanding credential helpers");
        }
        settled
    }

    fn register(&self, handle: SubprocessHandle) -> Arc<SubprocessHandle> {
        let handle = Arc::new(handle);
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle.id.clone(), Arc::clone(&handle));
        handle
    }

    /// The single cleanup path. Returns false if the handle was already settled.
    fn settle(&self, handle: &SubprocessHandle, mode: Settle) -> bool {
        if !handle.try_settle() {
            return false;
        }
        if mode == Settle::Kill {
            if let Some(pid) = handle.pid {
                kill_group(pid);
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&handle.workdir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(workdir = %handle.workdir.display(), error = %e, "failed to remove helper workdir");
            }
        }
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle.id);
        true
    }
}

#[async_trait]
impl<I: IdGen> CredentialExtractor for HelperSupervisor<I> {
    async fn extract(&self, tenant_id: &str, handle: &str) -> Option<CredentialSet> {
        self.run_helper(tenant_id, handle).await
    }
}

async fn capture_lines<R: AsyncRead + Unpin>(reader: R, handle: Arc<SubprocessHandle>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::trace!(run_id = handle.id(), line = %line, "helper output");
        handle.capture(line);
    }
}

fn read_artifact(path: &Path, tenant_id: &str) -> Option<CredentialSet> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(tenant_id, path = %path.display(), error = %e, "helper exited without a session artifact");
            return None;
        }
    };
    match CredentialSet::from_export_json(&content) {
        Ok(set) if !set.is_empty() => Some(set),
        Ok(_) => {
            tracing::warn!(tenant_id, "helper session artifact holds no cookies");
            None
        }
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "unparseable helper session artifact");
            None
        }
    }
}

fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => tracing::debug!(pid, "killed helper process group"),
        // Group already gone
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "failed to kill helper process group"),
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
