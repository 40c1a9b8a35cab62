// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle: startup, status reporting, shutdown.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use pb_adapters::{
    ContentError, ContentSource, CredentialStore, PlatformAdapter, SinkError, StatusSink,
};
use pb_core::{AgentConfig, ConfigError, StatusMachine, WorkerStatus};
use pb_engine::{
    AuthError, CredentialResolver, DeliveryHandler, Heartbeat, HelperSupervisor,
    PostingScheduler, ScheduleHandle, ShutdownFlag,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::control::StatusReport;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("no agent config given (pass a path or set PB_AGENT_CONFIG)")]
    NoAgentConfig,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to acquire lock: worker already running for this agent?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("content setup failed: {0}")]
    Content(#[from] ContentError),

    #[error("status sink unavailable: {0}")]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cleanup failed: {0}")]
    Cleanup(String),
}

/// Exclusive per-agent lock; the file holds the owner's PID
pub struct AgentLock {
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl AgentLock {
    pub fn acquire(path: &Path) -> Result<Self, LifecycleError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Don't truncate before locking, or a losing contender wipes the owner's PID
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(LifecycleError::LockFailed)?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Remove the PID file and drop the lock
    pub fn release(self) -> Result<(), LifecycleError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Adapters a worker runs against
pub struct WorkerDeps<S, P, C, K> {
    pub sink: S,
    pub platform: P,
    pub store: C,
    pub content: K,
    /// Absent when no extraction helper is configured
    pub supervisor: Option<HelperSupervisor>,
}

/// How a shutdown request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Graceful,
    /// Cleanup hit an error; `Error` was reported
    Failed(String),
    /// Cleanup did not finish before the hard deadline
    DeadlineExceeded,
    /// Another trigger already started shutdown
    AlreadyRequested,
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            ShutdownOutcome::Graceful | ShutdownOutcome::AlreadyRequested => 0,
            ShutdownOutcome::Failed(_) | ShutdownOutcome::DeadlineExceeded => 1,
        }
    }
}

/// A started worker for one agent
pub struct Worker<S: StatusSink> {
    agent_id: String,
    sink: S,
    status: StatusMachine,
    shutdown: ShutdownFlag,
    schedule: Option<ScheduleHandle>,
    heartbeat: Option<Heartbeat>,
    supervisor: Option<HelperSupervisor>,
    lock: Option<AgentLock>,
    deadline: Duration,
    started: Instant,
}

/// How an interruptible startup ended
pub enum Started<S: StatusSink> {
    Running(Worker<S>),
    /// A shutdown trigger arrived first; the partial startup was torn down
    Interrupted(ShutdownOutcome),
}

/// Start a worker: resolve credentials, arm the schedule, begin heartbeats.
///
/// On failure `Error` is reported with the reason, helpers are swept and the
/// lock is released before the error is returned.
pub async fn startup<S, P, C, K>(
    config: &AgentConfig,
    deps: WorkerDeps<S, P, C, K>,
    lock: Option<AgentLock>,
) -> Result<Worker<S>, LifecycleError>
where
    S: StatusSink,
    P: PlatformAdapter,
    C: CredentialStore,
    K: ContentSource,
{
    // The interrupt never resolves
    match startup_until(config, deps, lock, std::future::pending()).await? {
        Started::Running(worker) => Ok(worker),
        Started::Interrupted(outcome) => Err(LifecycleError::Cleanup(format!(
            "startup interrupted: {:?}",
            outcome
        ))),
    }
}

/// Like [`startup`], but abandons startup as soon as `interrupt` resolves.
///
/// The future yields the trigger name. Whatever startup got to (helper runs,
/// an armed schedule) is shut down through the normal shutdown path.
pub async fn startup_until<S, P, C, K, F>(
    config: &AgentConfig,
    deps: WorkerDeps<S, P, C, K>,
    lock: Option<AgentLock>,
    interrupt: F,
) -> Result<Started<S>, LifecycleError>
where
    S: StatusSink,
    P: PlatformAdapter,
    C: CredentialStore,
    K: ContentSource,
    F: Future<Output = &'static str>,
{
    let WorkerDeps {
        sink,
        platform,
        store,
        content,
        supervisor,
    } = deps;

    let mut worker = Worker {
        agent_id: config.agent_id.clone(),
        sink,
        status: StatusMachine::new(),
        shutdown: ShutdownFlag::new(),
        schedule: None,
        heartbeat: None,
        supervisor,
        lock,
        deadline: config.timing.shutdown_deadline,
        started: Instant::now(),
    };

    let finished = {
        let start = worker.startup_inner(config, platform, store, content);
        tokio::pin!(start);
        tokio::select! {
            result = &mut start => Ok(result),
            trigger = interrupt => Err(trigger),
        }
    };

    match finished {
        Ok(Ok(())) => Ok(Started::Running(worker)),
        Ok(Err(e)) => {
            worker.cleanup_on_failure(&e).await;
            Err(e)
        }
        Err(trigger) => {
            info!(agent_id = %worker.agent_id, trigger, "startup interrupted");
            Ok(Started::Interrupted(worker.shutdown(trigger).await))
        }
    }
}

/// Report `Error` for an agent that never got as far as a worker
pub async fn report_fatal<S: StatusSink>(sink: &S, agent_id: &str, error: &LifecycleError) {
    let reason = error.to_string();
    if let Err(e) = sink.report(agent_id, WorkerStatus::Error, Some(&reason)).await {
        warn!(agent_id, error = %e, "failed to report error status");
    }
    if let Err(e) = sink.flush().await {
        warn!(agent_id, error = %e, "failed to flush status sink");
    }
}

impl<S: StatusSink> Worker<S> {
    async fn startup_inner<P, C, K>(
        &mut self,
        config: &AgentConfig,
        platform: P,
        store: C,
        content: K,
    ) -> Result<(), LifecycleError>
    where
        P: PlatformAdapter,
        C: CredentialStore,
        K: ContentSource,
    {
        // 1. Announce; the coordinator clears the last heartbeat on this
        if let Err(e) = self
            .sink
            .report(&self.agent_id, WorkerStatus::Initializing, None)
            .await
        {
            warn!(agent_id = %self.agent_id, error = %e, "failed to report initializing");
        }

        // 2. Credentials first; nothing is armed without a verified session
        let mut resolver =
            CredentialResolver::new(store, platform.clone()).with_login(config.login.clone());
        if let Some(supervisor) = &self.supervisor {
            resolver = resolver.with_extractor(Arc::new(supervisor.clone()));
        }
        let resolution = resolver.resolve(&config.tenant_id, &config.handle).await?;
        info!(
            agent_id = %self.agent_id,
            tenant_id = %config.tenant_id,
            stage = %resolution.stage,
            "credentials resolved"
        );
        if let Some(count) = resolution.persisted {
            if let Err(e) = self.sink.credentials_saved(&config.tenant_id, count).await {
                warn!(tenant_id = %config.tenant_id, error = %e, "failed to record credential refresh");
            }
        }

        // 3. Arm the posting schedule
        let delivery = DeliveryHandler::new(platform, resolution.credentials);
        let schedule = PostingScheduler::new(
            self.agent_id.clone(),
            config.handle.clone(),
            delivery,
            content,
            self.shutdown.clone(),
        )
        .with_backoff(config.timing.delivery_backoff)
        .arm(config.schedule.clone());
        self.schedule = Some(schedule);

        // 4. Running, then heartbeats
        if let Err(e) = self.transition(WorkerStatus::Running, None).await {
            warn!(agent_id = %self.agent_id, error = %e, "failed to report running");
        }
        self.heartbeat = Some(Heartbeat::start(
            self.sink.clone(),
            self.agent_id.clone(),
            config.timing.heartbeat_interval,
        ));

        info!(agent_id = %self.agent_id, handle = %config.handle, "worker running");
        Ok(())
    }

    /// Clean up whatever startup created
    async fn cleanup_on_failure(&mut self, error: &LifecycleError) {
        error!(agent_id = %self.agent_id, error = %error, "worker startup failed");
        self.shutdown.request();
        if let Some(mut schedule) = self.schedule.take() {
            schedule.cancel();
            schedule.join().await;
        }
        if let Some(supervisor) = &self.supervisor {
            supervisor.shutdown_all();
        }
        self.status.advance(WorkerStatus::Error);
        report_fatal(&self.sink, &self.agent_id, error).await;
        if let Some(lock) = self.lock.take() {
            if let Err(e) = lock.release() {
                warn!(error = %e, "failed to release agent lock");
            }
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.current()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Snapshot for the `status` control command
    pub fn status_report(&self) -> StatusReport {
        let (fires, next_fire) = match &self.schedule {
            Some(schedule) => (
                schedule.fire_count(),
                schedule.state().next_fire().map(|at| at.to_rfc3339()),
            ),
            None => (0, None),
        };
        StatusReport {
            agent_id: self.agent_id.clone(),
            status: self.status.current(),
            fires,
            next_fire,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    /// Shut down gracefully within the hard deadline.
    ///
    /// Only the first call does anything; the shared flag stops the
    /// scheduler from firing or re-arming from here on.
    pub async fn shutdown(&mut self, trigger: &str) -> ShutdownOutcome {
        if !self.shutdown.request() {
            info!(agent_id = %self.agent_id, trigger, "shutdown already in progress");
            return ShutdownOutcome::AlreadyRequested;
        }
        info!(agent_id = %self.agent_id, trigger, "shutting down");

        if let Err(e) = self.transition(WorkerStatus::Stopping, None).await {
            warn!(agent_id = %self.agent_id, error = %e, "failed to report stopping");
        }
        if let Some(schedule) = &self.schedule {
            schedule.cancel();
        }

        let deadline = self.deadline;
        match tokio::time::timeout(deadline, self.cleanup()).await {
            Ok(Ok(())) => {
                info!(agent_id = %self.agent_id, "worker stopped");
                ShutdownOutcome::Graceful
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                error!(agent_id = %self.agent_id, error = %reason, "shutdown cleanup failed");
                self.report_error(&reason).await;
                ShutdownOutcome::Failed(reason)
            }
            Err(_) => {
                error!(
                    agent_id = %self.agent_id,
                    deadline_ms = deadline.as_millis() as u64,
                    "shutdown deadline exceeded"
                );
                // Whatever cleanup did not reach, at least no helper outlives us
                if let Some(supervisor) = &self.supervisor {
                    supervisor.shutdown_all();
                }
                self.report_error("shutdown deadline exceeded").await;
                ShutdownOutcome::DeadlineExceeded
            }
        }
    }

    async fn cleanup(&mut self) -> Result<(), LifecycleError> {
        if let Some(supervisor) = &self.supervisor {
            supervisor.shutdown_all();
        }
        // Heartbeats are for Running only
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        // Lets an in-flight delivery finish
        if let Some(mut schedule) = self.schedule.take() {
            schedule.join().await;
        }
        self.transition(WorkerStatus::Stopped, None)
            .await
            .map_err(|e| LifecycleError::Cleanup(e.to_string()))?;
        self.sink
            .flush()
            .await
            .map_err(|e| LifecycleError::Cleanup(e.to_string()))?;
        if let Some(lock) = self.lock.take() {
            lock.release()
                .map_err(|e| LifecycleError::Cleanup(e.to_string()))?;
        }
        Ok(())
    }

    async fn report_error(&mut self, reason: &str) {
        if let Err(e) = self.transition(WorkerStatus::Error, Some(reason)).await {
            warn!(agent_id = %self.agent_id, error = %e, "failed to report error status");
        }
        if let Err(e) = self.sink.flush().await {
            warn!(agent_id = %self.agent_id, error = %e, "failed to flush status sink");
        }
    }

    /// Advance the local state machine and report the new status
    async fn transition(
        &mut self,
        next: WorkerStatus,
        error: Option<&str>,
    ) -> Result<(), SinkError> {
        let from = self.status.current();
        if !self.status.advance(next) {
            warn!(agent_id = %self.agent_id, %from, to = %next, "ignoring invalid status transition");
            return Ok(());
        }
        self.sink.report(&self.agent_id, next, error).await
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
