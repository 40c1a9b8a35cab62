// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic liveness reporting

use pb_adapters::StatusSink;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Which path a heartbeat took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatOutcome {
    /// Written through the sink's batched log
    Primary,
    /// Primary failed; written directly to the snapshot
    Fallback,
    /// Both paths failed
    Missed,
}

/// Send one heartbeat, falling back to the direct path on failure.
/// Never fails; every problem is logged.
pub async fn beat<S: StatusSink>(sink: &S, agent_id: &str) -> BeatOutcome {
    let primary = match sink.heartbeat(agent_id).await {
        Ok(()) => return BeatOutcome::Primary,
        Err(e) => e,
    };
    match sink.heartbeat_direct(agent_id).await {
        Ok(()) => {
            tracing::warn!(agent_id, error = %primary, "heartbeat used direct fallback");
            BeatOutcome::Fallback
        }
        Err(e) => {
            tracing::error!(agent_id, primary = %primary, fallback = %e, "heartbeat missed");
            BeatOutcome::Missed
        }
    }
}

/// Background heartbeat loop
pub struct Heartbeat {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Start beating every `interval`, the first beat one interval from now
    pub fn start<S: StatusSink>(sink: S, agent_id: impl Into<String>, interval: Duration) -> Self {
        let agent_id = agent_id.into();
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // The watch guard must not live across the beat's await
                tokio::select! {
                    _ = async { let _ = stopped.wait_for(|s| *s).await; } => break,
                    _ = ticker.tick() => {
                        beat(&sink, &agent_id).await;
                    }
                }
            }
            tracing::debug!(agent_id = %agent_id, "heartbeat stopped");
        });

        Self {
            stop,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for it; later calls do nothing
    pub async fn stop(&mut self) {
        self.stop.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "heartbeat task failed");
            }
        }
    }
}
