// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postbot Worker (pbw)
//!
//! One process per deployed agent: resolves the tenant's session, posts on
//! schedule and reports status until told to stop.

use std::process::ExitCode;
use std::time::Duration;

use pb_adapters::{
    ContentSource, CredentialStore, FileCredentialStore, HttpPlatformAdapter, NoOpPlatformAdapter,
    PlatformAdapter, StatusSink, TemplateContentSource, TracedPlatformAdapter, TracedStatusSink,
    WalStatusSink,
};
use pb_core::AgentConfig;
use pb_engine::HelperSupervisor;
use pb_worker::{
    config_path, load_agent_config, report_fatal, spawn_line_reader, startup_until, AgentLock,
    ControlCommand, LifecycleError, Started, Worker, WorkerDeps, WorkerPaths, AGENT_ID_ENV,
};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Startup marker prefix written to log before anything else.
/// The coordinator uses this to find where the current startup attempt begins.
/// Full format: "--- pbw: starting (pid: 12345)"
pub const STARTUP_MARKER_PREFIX: &str = "--- pbw: starting (pid: ";

/// Slack the watchdog gives the in-process deadline before exiting hard
const WATCHDOG_GRACE: Duration = Duration::from_millis(500);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    ExitCode::from(run(&args).await)
}

async fn run(args: &[String]) -> u8 {
    let config = match config_path(args).and_then(|path| load_agent_config(&path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pbw: {}", e);
            report_unloadable_config(&e).await;
            return 1;
        }
    };

    let paths = match WorkerPaths::for_agent(&config.agent_id) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("pbw: {}", e);
            return 1;
        }
    };

    // Write startup marker to log (before tracing setup, so the coordinator can find it)
    if let Err(e) = write_startup_marker(&paths) {
        eprintln!("pbw: {}", e);
        return 1;
    }
    let log_guard = match setup_logging(&paths) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("pbw: {}", e);
            return 1;
        }
    };

    info!(agent_id = %config.agent_id, handle = %config.handle, "starting pbw");
    let code = start(&config, &paths).await;
    info!(agent_id = %config.agent_id, code, "pbw exiting");

    drop(log_guard);
    code
}

/// Acquire the lock, build adapters and hand over to the worker
async fn start(config: &AgentConfig, paths: &WorkerPaths) -> u8 {
    // The holder owns this agent's status, so a lost lock is never reported
    let lock = match AgentLock::acquire(&paths.lock_path) {
        Ok(lock) => lock,
        Err(e) => return fail(paths, None, &e),
    };

    let sink = match WalStatusSink::open(&paths.wal_path, &paths.snapshot_dir) {
        Ok(sink) => TracedStatusSink::new(sink),
        Err(e) => return fail(paths, Some(lock), &e.into()),
    };

    let content = match TemplateContentSource::new(&config.content) {
        Ok(content) => content,
        Err(e) => {
            let e = LifecycleError::from(e);
            report_fatal(&sink, &config.agent_id, &e).await;
            return fail(paths, Some(lock), &e);
        }
    };

    let store = FileCredentialStore::new(&paths.credentials_dir);
    let supervisor = config.helper.clone().map(|helper| {
        HelperSupervisor::new(helper, &paths.helper_root, config.timing.helper_timeout)
    });

    if config.platform.dry_run {
        info!(agent_id = %config.agent_id, "dry run: posts will not reach the platform");
        let platform = TracedPlatformAdapter::new(NoOpPlatformAdapter::new());
        serve(config, paths, WorkerDeps { sink, platform, store, content, supervisor }, lock).await
    } else {
        let platform = TracedPlatformAdapter::new(HttpPlatformAdapter::new(&config.platform));
        serve(config, paths, WorkerDeps { sink, platform, store, content, supervisor }, lock).await
    }
}

/// What woke the control loop
enum Trigger {
    Stop(&'static str),
    Line(String),
}

/// Shutdown signals plus the stdin control channel
struct Triggers {
    sigterm: Signal,
    sigint: Signal,
    commands: mpsc::UnboundedReceiver<String>,
    stdin_open: bool,
}

impl Triggers {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            commands: spawn_line_reader(std::io::BufReader::new(std::io::stdin())),
            stdin_open: true,
        })
    }

    async fn next(&mut self) -> Trigger {
        loop {
            tokio::select! {
                _ = self.sigterm.recv() => return Trigger::Stop("SIGTERM"),
                _ = self.sigint.recv() => return Trigger::Stop("SIGINT"),
                line = self.commands.recv(), if self.stdin_open => match line {
                    Some(line) => return Trigger::Line(line),
                    None => {
                        info!("stdin closed, control commands disabled");
                        self.stdin_open = false;
                    }
                },
            }
        }
    }
}

fn is_shutdown(line: &str) -> bool {
    matches!(line.parse::<ControlCommand>(), Ok(ControlCommand::Shutdown))
}

/// Run the worker until a shutdown trigger, then shut it down.
///
/// Triggers are live from before startup, so a signal during credential
/// resolution still tears down helpers and releases the lock.
async fn serve<S, P, C, K>(
    config: &AgentConfig,
    paths: &WorkerPaths,
    deps: WorkerDeps<S, P, C, K>,
    lock: AgentLock,
) -> u8
where
    S: StatusSink,
    P: PlatformAdapter,
    C: CredentialStore,
    K: ContentSource,
{
    let mut triggers = match Triggers::install() {
        Ok(triggers) => triggers,
        Err(e) => {
            let e = LifecycleError::from(e);
            error!(error = %e, "failed to install signal handlers");
            report_fatal(&deps.sink, &config.agent_id, &e).await;
            return fail(paths, Some(lock), &e);
        }
    };
    let deadline = config.timing.shutdown_deadline;

    // Commands other than shutdown wait until the worker is up
    let mut deferred = Vec::new();
    let interrupt = async {
        loop {
            match triggers.next().await {
                Trigger::Stop(trigger) => break trigger,
                Trigger::Line(line) if is_shutdown(&line) => break "stdin",
                Trigger::Line(line) => deferred.push(line),
            }
        }
    };
    let interrupt = async {
        let trigger = interrupt.await;
        spawn_watchdog(deadline);
        trigger
    };

    let worker = match startup_until(config, deps, Some(lock), interrupt).await {
        Ok(Started::Running(worker)) => worker,
        Ok(Started::Interrupted(outcome)) => return outcome.exit_code(),
        Err(e) => {
            // startup already reported Error and released the lock
            write_startup_error(paths, &e);
            return 1;
        }
    };
    run_until_stopped(worker, triggers, deferred, deadline).await
}

async fn run_until_stopped<S: StatusSink>(
    mut worker: Worker<S>,
    mut triggers: Triggers,
    deferred: Vec<String>,
    deadline: Duration,
) -> u8 {
    // Signal ready for the coordinator waiting on startup
    println!("READY");

    // A shutdown line would have interrupted startup, so none is deferred
    for line in deferred {
        handle_command(&worker, &line);
    }
    let trigger = loop {
        match triggers.next().await {
            Trigger::Stop(trigger) => break trigger,
            Trigger::Line(line) => {
                if handle_command(&worker, &line) {
                    break "stdin";
                }
            }
        }
    };

    info!(trigger, "shutdown requested");
    spawn_watchdog(deadline);
    worker.shutdown(trigger).await.exit_code()
}

/// Exit hard if graceful shutdown overruns its deadline
fn spawn_watchdog(deadline: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(deadline + WATCHDOG_GRACE);
        eprintln!("pbw: shutdown deadline exceeded, exiting");
        std::process::exit(1);
    });
}

/// Startup failure after logging is up
fn fail(paths: &WorkerPaths, lock: Option<AgentLock>, error: &LifecycleError) -> u8 {
    write_startup_error(paths, error);
    error!(error = %error, "failed to start worker");
    if let Some(lock) = lock {
        if let Err(e) = lock.release() {
            warn!(error = %e, "failed to release agent lock");
        }
    }
    1
}

/// Without a config there is no agent id; fall back to `PB_AGENT_ID`
async fn report_unloadable_config(error: &LifecycleError) {
    let Ok(agent_id) = std::env::var(AGENT_ID_ENV) else {
        return;
    };
    let path_safe = !agent_id.is_empty()
        && agent_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !path_safe {
        eprintln!("pbw: ignoring invalid {} {:?}", AGENT_ID_ENV, agent_id);
        return;
    }
    let Ok(paths) = WorkerPaths::for_agent(&agent_id) else {
        return;
    };
    write_startup_error(&paths, error);
    match WalStatusSink::open(&paths.wal_path, &paths.snapshot_dir) {
        Ok(sink) => report_fatal(&sink, &agent_id, error).await,
        Err(e) => eprintln!("pbw: cannot report error status: {}", e),
    }
}

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(paths: &WorkerPaths) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{})", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
/// Tracing is non-blocking and may not flush before the process exits.
fn write_startup_error(paths: &WorkerPaths, error: &LifecycleError) {
    use std::io::Write;

    if let Some(parent) = paths.log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start worker: {}", error);
}

fn setup_logging(
    paths: &WorkerPaths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(
        paths.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        paths.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
