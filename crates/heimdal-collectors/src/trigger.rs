//! Single-flight front door for collection cycles.
//!
//! Both the cron job and on-demand API requests go through [`CycleTrigger`].
//! At most one cycle runs at a time. Requests that arrive while a cycle is in
//! flight collapse into a single pending run that starts as soon as the
//! current one finishes.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

use crate::collector::panic_message;
use crate::orchestrator::{CycleSource, CycleSummary, Orchestrator};

/// Anything that can run one full collection cycle.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, source: CycleSource) -> CycleSummary;
}

#[async_trait]
impl CycleRunner for Orchestrator {
    async fn run_cycle(&self, source: CycleSource) -> CycleSummary {
        Orchestrator::run_cycle(self, source).await
    }
}

/// Immediate answer to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAck {
    /// A cycle started for this request.
    Started,
    /// A cycle is running; this request will run right after it.
    Queued,
    /// A cycle is running and another request is already waiting.
    AlreadyQueued,
    /// The trigger has been stopped.
    Stopped,
}

struct Inner {
    runner: Arc<dyn CycleRunner>,
    permit: Arc<Semaphore>,
    /// Guards the hand-off between a finishing cycle and new requests.
    pending: Mutex<Pending>,
    running: watch::Sender<bool>,
}

#[derive(Default)]
struct Pending {
    next: Option<CycleSource>,
    stopped: bool,
}

#[derive(Clone)]
pub struct CycleTrigger {
    inner: Arc<Inner>,
}

impl CycleTrigger {
    #[must_use]
    pub fn new(runner: Arc<dyn CycleRunner>) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                runner,
                permit: Arc::new(Semaphore::new(1)),
                pending: Mutex::new(Pending::default()),
                running,
            }),
        }
    }

    /// Starts a cycle, or queues one if a cycle is already running. Never waits
    /// for the cycle itself.
    pub fn request(&self, source: CycleSource) -> TriggerAck {
        let mut pending = self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.stopped {
            return TriggerAck::Stopped;
        }
        if let Ok(permit) = Arc::clone(&self.inner.permit).try_acquire_owned() {
            self.inner.running.send_replace(true);
            drop(pending);
            tokio::spawn(drive(Arc::clone(&self.inner), permit, source));
            tracing::info!(trigger = source.as_str(), "trigger: cycle started");
            return TriggerAck::Started;
        }
        if pending.next.is_some() {
            tracing::debug!(trigger = source.as_str(), "trigger: cycle already queued");
            TriggerAck::AlreadyQueued
        } else {
            pending.next = Some(source);
            tracing::info!(trigger = source.as_str(), "trigger: cycle queued behind running cycle");
            TriggerAck::Queued
        }
    }

    /// Refuses further requests and drops any queued one. An in-flight cycle
    /// runs to completion.
    pub fn stop(&self) {
        let mut pending = self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.stopped = true;
        pending.next = None;
        tracing::info!("trigger: stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stopped
    }

    /// Resolves once no cycle is running or queued.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.running.subscribe();
        // The sender lives in `self.inner`, so the channel cannot close here.
        let _ = rx.wait_for(|running| !*running).await;
    }
}

async fn drive(inner: Arc<Inner>, permit: OwnedSemaphorePermit, first: CycleSource) {
    let mut source = first;
    loop {
        match AssertUnwindSafe(inner.runner.run_cycle(source))
            .catch_unwind()
            .await
        {
            Ok(summary) => {
                tracing::debug!(cycle_id = %summary.cycle_id, "trigger: cycle finished");
            }
            Err(panic) => tracing::error!(
                trigger = source.as_str(),
                panic = %panic_message(&*panic),
                "trigger: cycle panicked"
            ),
        }

        let mut pending = inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.next.take() {
            Some(next) if !pending.stopped => source = next,
            _ => {
                drop(permit);
                inner.running.send_replace(false);
                return;
            }
        }
    }
}
