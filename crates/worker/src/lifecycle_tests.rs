// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pb_adapters::{
    FakeContentSource, FakeCredentialStore, FakePlatformAdapter, FakeStatusSink,
    PublishBehavior, SinkCall,
};
use pb_core::{CredentialSet, HelperConfig, LoginCredentials, SessionCookie};
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

const CONFIG: &str = r#"
agent_id = "agent-1"
tenant_id = "tenant-a"
handle = "poster"

[schedule]
mode = "custom"
custom_interval = 1
"#;

fn token(value: &str) -> CredentialSet {
    CredentialSet::new(vec![SessionCookie::new("auth_token", value)])
}

struct Fixture {
    config: AgentConfig,
    sink: FakeStatusSink,
    platform: FakePlatformAdapter,
    store: FakeCredentialStore,
    content: FakeContentSource,
}

impl Fixture {
    /// Stored credentials that the platform accepts
    fn with_stored_session() -> Self {
        let fixture = Self::without_credentials();
        fixture.store.insert("tenant-a", token("good"));
        fixture.platform.accept_token("good");
        fixture
    }

    fn without_credentials() -> Self {
        Self {
            config: AgentConfig::parse(CONFIG).unwrap(),
            sink: FakeStatusSink::new(),
            platform: FakePlatformAdapter::new(),
            store: FakeCredentialStore::new(),
            content: FakeContentSource::new(),
        }
    }

    fn deps(
        &self,
    ) -> WorkerDeps<FakeStatusSink, FakePlatformAdapter, FakeCredentialStore, FakeContentSource>
    {
        WorkerDeps {
            sink: self.sink.clone(),
            platform: self.platform.clone(),
            store: self.store.clone(),
            content: self.content.clone(),
            supervisor: None,
        }
    }

    async fn start(&self) -> Result<Worker<FakeStatusSink>, LifecycleError> {
        startup(&self.config, self.deps(), None).await
    }
}

#[tokio::test(start_paused = true)]
async fn startup_reports_running_once_credentials_resolve() {
    let fixture = Fixture::with_stored_session();

    let mut worker = fixture.start().await.unwrap();

    assert_eq!(worker.status(), WorkerStatus::Running);
    assert_eq!(
        fixture.sink.statuses(),
        vec![WorkerStatus::Initializing, WorkerStatus::Running]
    );
    worker.shutdown("test").await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_credentials_report_error_and_never_run() {
    let fixture = Fixture::without_credentials();

    let err = fixture.start().await.err().unwrap();

    assert!(matches!(err, LifecycleError::Auth(_)));
    assert_eq!(
        fixture.sink.statuses(),
        vec![WorkerStatus::Initializing, WorkerStatus::Error]
    );
    let reason = fixture.sink.last_error().unwrap();
    assert!(reason.starts_with("authentication exhausted"), "{}", reason);
    assert!(fixture.platform.published_texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fresh_login_is_recorded_with_the_sink() {
    let mut fixture = Fixture::without_credentials();
    fixture.config.login = Some(LoginCredentials {
        username: "poster".to_string(),
        password: "pw".to_string(),
    });
    fixture.platform.set_login_result(Some(token("fresh")));
    fixture.platform.accept_token("fresh");

    let mut worker = fixture.start().await.unwrap();

    assert!(fixture.sink.calls().contains(&SinkCall::CredentialsSaved {
        tenant_id: "tenant-a".to_string(),
        count: 1,
    }));
    worker.shutdown("test").await;
}

#[tokio::test(start_paused = true)]
async fn running_worker_posts_and_heartbeats() {
    let fixture = Fixture::with_stored_session();
    let mut worker = fixture.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(65)).await;

    assert_eq!(fixture.platform.published_texts().len(), 1);
    assert_eq!(fixture.sink.heartbeat_count(), 2);
    assert_eq!(worker.status_report().fires, 1);
    worker.shutdown("test").await;
}

#[tokio::test(start_paused = true)]
async fn graceful_shutdown_stops_everything() {
    let fixture = Fixture::with_stored_session();
    let mut worker = fixture.start().await.unwrap();

    let outcome = worker.shutdown("SIGTERM").await;

    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        fixture.sink.statuses(),
        vec![
            WorkerStatus::Initializing,
            WorkerStatus::Running,
            WorkerStatus::Stopping,
            WorkerStatus::Stopped,
        ]
    );
    assert_eq!(fixture.sink.calls().last(), Some(&SinkCall::Flush));

    // No heartbeats or posts after shutdown
    let calls = fixture.sink.calls().len();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fixture.sink.calls().len(), calls);
    assert!(fixture.platform.published_texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_shutdown_is_a_no_op() {
    let fixture = Fixture::with_stored_session();
    let mut worker = fixture.start().await.unwrap();

    assert_eq!(worker.shutdown("SIGTERM").await, ShutdownOutcome::Graceful);
    assert_eq!(
        worker.shutdown("stdin").await,
        ShutdownOutcome::AlreadyRequested
    );

    let stopping = fixture
        .sink
        .statuses()
        .into_iter()
        .filter(|s| *s == WorkerStatus::Stopping)
        .count();
    assert_eq!(stopping, 1);
    let flushes = fixture
        .sink
        .calls()
        .into_iter()
        .filter(|c| *c == SinkCall::Flush)
        .count();
    assert_eq!(flushes, 1);
}

#[tokio::test(start_paused = true)]
async fn cleanup_failure_reports_error() {
    let fixture = Fixture::with_stored_session();
    fixture.sink.fail_report_of(WorkerStatus::Stopped);
    let mut worker = fixture.start().await.unwrap();

    let outcome = worker.shutdown("SIGTERM").await;

    assert!(matches!(outcome, ShutdownOutcome::Failed(_)));
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(worker.status(), WorkerStatus::Error);
    assert_eq!(fixture.sink.statuses().last(), Some(&WorkerStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn stalled_delivery_hits_the_shutdown_deadline() {
    let fixture = Fixture::with_stored_session();
    fixture
        .platform
        .script_publish([PublishBehavior::Stall(Duration::from_secs(3600))]);
    let mut worker = fixture.start().await.unwrap();

    // Fire at one minute, then stall inside publish
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(worker.status_report().fires, 1);

    let outcome = worker.shutdown("SIGTERM").await;

    assert_eq!(outcome, ShutdownOutcome::DeadlineExceeded);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(
        fixture.sink.last_error().as_deref(),
        Some("shutdown deadline exceeded")
    );
}

#[tokio::test(start_paused = true)]
async fn heartbeats_stop_while_delivery_drains() {
    let mut fixture = Fixture::with_stored_session();
    fixture.config.timing.shutdown_deadline = Duration::from_secs(600);
    fixture
        .platform
        .script_publish([PublishBehavior::Stall(Duration::from_secs(120))]);
    let mut worker = fixture.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;

    let outcome = worker.shutdown("SIGTERM").await;

    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_eq!(fixture.platform.published_texts().len(), 1);
    let calls = fixture.sink.calls();
    let stopping = calls
        .iter()
        .position(|c| {
            matches!(
                c,
                SinkCall::Report {
                    status: WorkerStatus::Stopping,
                    ..
                }
            )
        })
        .unwrap();
    assert!(!calls[stopping..]
        .iter()
        .any(|c| matches!(c, SinkCall::Heartbeat { .. } | SinkCall::HeartbeatDirect { .. })));
}

#[tokio::test(start_paused = true)]
async fn status_report_shows_next_fire() {
    let fixture = Fixture::with_stored_session();
    let mut worker = fixture.start().await.unwrap();
    tokio::task::yield_now().await;

    let report = worker.status_report();

    assert_eq!(report.agent_id, "agent-1");
    assert_eq!(report.status, WorkerStatus::Running);
    assert!(report.next_fire.is_some());
    worker.shutdown("test").await;
}

#[test]
fn agent_lock_is_exclusive_and_released() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agents/agent-1/worker.pid");

    let lock = AgentLock::acquire(&path).unwrap();
    let pid = std::fs::read_to_string(&path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    assert!(matches!(
        AgentLock::acquire(&path),
        Err(LifecycleError::LockFailed(_))
    ));
    // The losing attempt leaves the owner's PID alone
    assert_eq!(std::fs::read_to_string(&path).unwrap(), pid);

    lock.release().unwrap();
    assert!(!path.exists());
    AgentLock::acquire(&path).unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_startup_releases_the_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("worker.pid");
    let fixture = Fixture::without_credentials();
    let lock = AgentLock::acquire(&path).unwrap();

    assert!(startup(&fixture.config, fixture.deps(), Some(lock))
        .await
        .is_err());

    assert!(!path.exists());
}

#[tokio::test]
async fn signal_during_helper_run_tears_startup_down() {
    let dir = TempDir::new().unwrap();
    let program = dir.path().join("helper.sh");
    std::fs::write(&program, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    let helper_root = dir.path().join("helpers");
    let supervisor = HelperSupervisor::new(
        HelperConfig {
            program,
            args: Vec::new(),
        },
        &helper_root,
        Duration::from_secs(300),
    );
    let lock_path = dir.path().join("worker.pid");
    let lock = AgentLock::acquire(&lock_path).unwrap();

    let fixture = Fixture::without_credentials();
    let mut deps = fixture.deps();
    deps.supervisor = Some(supervisor.clone());
    let interrupt = async {
        for _ in 0..250 {
            if supervisor.tracked_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        "SIGTERM"
    };

    let started = tokio::time::timeout(
        Duration::from_secs(10),
        startup_until(&fixture.config, deps, Some(lock), interrupt),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(matches!(
        started,
        Started::Interrupted(ShutdownOutcome::Graceful)
    ));
    assert_eq!(
        fixture.sink.statuses(),
        vec![
            WorkerStatus::Initializing,
            WorkerStatus::Stopping,
            WorkerStatus::Stopped,
        ]
    );
    assert_eq!(supervisor.tracked_count(), 0);
    let leftover = std::fs::read_dir(&helper_root)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
    assert!(!lock_path.exists());
}
