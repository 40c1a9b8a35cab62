// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring posting timer
//!
//! One task per worker: compute the next fire time, sleep until then, post
//! once, and re-arm. A failed post waits out the backoff before re-arming.

use crate::delivery::DeliveryHandler;
use crate::shutdown::ShutdownFlag;
use chrono::{DateTime, Utc};
use pb_adapters::{ContentRequest, ContentSource, PlatformAdapter, Post};
use pb_core::{
    next_fire_time, Clock, IdGen, RecurrenceConfig, ScheduledAction, SystemClock, UuidIdGen,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default wait after a failed delivery
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

/// What the scheduler is doing right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleState {
    /// Not yet armed
    Idle,
    /// Waiting for the action to fire
    Armed(ScheduledAction),
    /// The action fired; content is being generated and delivered
    Firing(ScheduledAction),
    /// Last fire failed; re-arming after `until`
    BackingOff { until: DateTime<Utc> },
    /// Cancelled or shut down; will not fire again
    Stopped,
}

impl ScheduleState {
    /// Pending fire time, if armed
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        match self {
            ScheduleState::Armed(action) => Some(action.fire_at),
            _ => None,
        }
    }
}

/// Control over an armed schedule. Dropping the handle cancels it.
pub struct ScheduleHandle {
    cancel: watch::Sender<bool>,
    state: watch::Receiver<ScheduleState>,
    fires: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Cancel the pending fire. A delivery already in flight completes,
    /// but nothing is armed after it.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn state(&self) -> ScheduleState {
        self.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ScheduleState> {
        self.state.clone()
    }

    /// Number of times the schedule has fired
    pub fn fire_count(&self) -> u64 {
        self.fires.load(Ordering::SeqCst)
    }

    /// Wait for the scheduler task to finish
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "scheduler task failed");
            }
        }
    }
}

/// Builds and arms the posting timer for one agent
pub struct PostingScheduler<P, S, C = SystemClock, I = UuidIdGen> {
    agent_id: String,
    handle: String,
    delivery: DeliveryHandler<P>,
    content: S,
    clock: C,
    ids: I,
    backoff: Duration,
    shutdown: ShutdownFlag,
}

impl<P: PlatformAdapter, S: ContentSource> PostingScheduler<P, S> {
    pub fn new(
        agent_id: impl Into<String>,
        handle: impl Into<String>,
        delivery: DeliveryHandler<P>,
        content: S,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            handle: handle.into(),
            delivery,
            content,
            clock: SystemClock,
            ids: UuidIdGen,
            backoff: DEFAULT_BACKOFF,
            shutdown,
        }
    }
}

impl<P, S, C, I> PostingScheduler<P, S, C, I>
where
    P: PlatformAdapter,
    S: ContentSource,
    C: Clock,
    I: IdGen,
{
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_clock<C2: Clock>(self, clock: C2) -> PostingScheduler<P, S, C2, I> {
        PostingScheduler {
            agent_id: self.agent_id,
            handle: self.handle,
            delivery: self.delivery,
            content: self.content,
            clock,
            ids: self.ids,
            backoff: self.backoff,
            shutdown: self.shutdown,
        }
    }

    pub fn with_id_gen<I2: IdGen>(self, ids: I2) -> PostingScheduler<P, S, C, I2> {
        PostingScheduler {
            agent_id: self.agent_id,
            handle: self.handle,
            delivery: self.delivery,
            content: self.content,
            clock: self.clock,
            ids,
            backoff: self.backoff,
            shutdown: self.shutdown,
        }
    }

    /// Start the recurring timer
    pub fn arm(self, config: RecurrenceConfig) -> ScheduleHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ScheduleState::Idle);
        let fires = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(self.run(config, cancel_rx, state_tx, Arc::clone(&fires)));

        ScheduleHandle {
            cancel: cancel_tx,
            state: state_rx,
            fires,
            task: Some(task),
        }
    }

    async fn run(
        self,
        config: RecurrenceConfig,
        mut cancel: watch::Receiver<bool>,
        state: watch::Sender<ScheduleState>,
        fires: Arc<AtomicU64>,
    ) {
        loop {
            if self.shutdown.is_requested() || *cancel.borrow() {
                break;
            }

            let now = self.clock.utc_now();
            let action = ScheduledAction::new(
                self.ids.next(),
                self.agent_id.clone(),
                next_fire_time(&config, now),
            );
            let delay = action.delay_from(now);
            tracing::info!(
                agent_id = %self.agent_id,
                action_id = %action.id,
                fire_at = %action.fire_at,
                delay_secs = delay.as_secs(),
                "post armed"
            );
            state.send_replace(ScheduleState::Armed(action.clone()));

            tokio::select! {
                _ = cancel.wait_for(|cancelled| *cancelled) => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if self.shutdown.is_requested() {
                tracing::info!(action_id = %action.id, "shutdown in progress, not firing");
                break;
            }

            state.send_replace(ScheduleState::Firing(action.clone()));
            let sequence = fires.fetch_add(1, Ordering::SeqCst);
            let delivered = self.fire(&action, sequence).await;

            if self.shutdown.is_requested() || *cancel.borrow() {
                break;
            }

            if !delivered {
                let until = self.clock.utc_now()
                    + chrono::Duration::from_std(self.backoff).unwrap_or(chrono::Duration::zero());
                tracing::warn!(
                    action_id = %action.id,
                    backoff_secs = self.backoff.as_secs(),
                    "post failed, backing off"
                );
                state.send_replace(ScheduleState::BackingOff { until });
                tokio::select! {
                    _ = cancel.wait_for(|cancelled| *cancelled) => break,
                    _ = tokio::time::sleep(self.backoff) => {}
                }
            }
        }

        state.send_replace(ScheduleState::Stopped);
        tracing::info!(agent_id = %self.agent_id, "scheduler stopped");
    }

    /// Generate and deliver one post. Returns whether it was delivered.
    async fn fire(&self, action: &ScheduledAction, sequence: u64) -> bool {
        let request = ContentRequest {
            agent_id: self.agent_id.clone(),
            handle: self.handle.clone(),
            sequence,
            at: self.clock.utc_now(),
        };
        let text = match self.content.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(action_id = %action.id, error = %e, "content generation failed");
                return false;
            }
        };
        self.delivery
            .deliver(Post::new(action.id.clone(), text))
            .await
            .success
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
