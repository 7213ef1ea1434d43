//! One collection cycle across every enabled collector.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use heimdal_db::{CollectorRunEntry, Repository, RunOutcome, RunStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::collector::{panic_message, CollectorResult, Outcome};
use crate::error::{CollectError, ErrorKind};
use crate::registry::CollectorRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// No cycle is in progress.
    Idle,
    Running,
    /// Every collector has finished and the summary is being recorded.
    /// Falls back to `Idle` once the summary is logged.
    CompletedThisCycle,
}

/// What started a cycle. Stored in the run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSource {
    Scheduled,
    OnDemand,
    Cli,
}

impl CycleSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CycleSource::Scheduled => "scheduled",
            CycleSource::OnDemand => "on_demand",
            CycleSource::Cli => "cli",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub trigger: CycleSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub per_collector: BTreeMap<String, CollectorResult>,
}

impl CycleSummary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.per_collector.values().filter(|r| r.success).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.per_collector.len() - self.succeeded()
    }

    /// Records saved across all collectors.
    #[must_use]
    pub fn items_saved(&self) -> usize {
        self.per_collector
            .values()
            .filter(|r| r.outcome == Outcome::Saved)
            .map(|r| r.items)
            .sum()
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        match (self.succeeded(), self.failed()) {
            (_, 0) => RunStatus::Succeeded,
            (0, _) => RunStatus::Failed,
            _ => RunStatus::Partial,
        }
    }

    fn to_run_outcome(&self) -> RunOutcome {
        let failed: Vec<&str> = self
            .per_collector
            .values()
            .filter(|r| !r.success)
            .map(|r| r.collector.as_str())
            .collect();
        RunOutcome {
            status: self.status(),
            completed_at: self.finished_at,
            items_saved: clamp_i32(self.items_saved()),
            error_message: (!failed.is_empty())
                .then(|| format!("failed collectors: {}", failed.join(", "))),
            collectors: self
                .per_collector
                .values()
                .map(|r| CollectorRunEntry {
                    collector: r.collector.clone(),
                    outcome: r.outcome.as_str(),
                    success: r.success,
                    items: clamp_i32(r.items),
                    skipped: clamp_i32(r.skipped),
                    duration_ms: i64::try_from(r.duration.as_millis()).unwrap_or(i64::MAX),
                    error_kind: r.error_kind.map(ErrorKind::as_str),
                    error_message: r.error.clone(),
                })
                .collect(),
        }
    }
}

fn clamp_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Runs every enabled collector concurrently and aggregates the results.
///
/// `run_cycle` never fails. Each collector runs in its own task under
/// `collector_timeout`; a panic or an overrun becomes that collector's failed
/// result. A collector whose run fails with an auth error is disabled in the
/// registry. The cycle is recorded in the run ledger when the ledger is
/// reachable; ledger errors are logged and otherwise ignored.
pub struct Orchestrator {
    registry: Arc<CollectorRegistry>,
    repo: Arc<dyn Repository>,
    collector_timeout: Duration,
    state: Mutex<OrchestratorState>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<CollectorRegistry>,
        repo: Arc<dyn Repository>,
        collector_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            repo,
            collector_timeout,
            state: Mutex::new(OrchestratorState::Idle),
        }
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CollectorRegistry> {
        &self.registry
    }

    fn set_state(&self, next: OrchestratorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub async fn run_cycle(&self, trigger: CycleSource) -> CycleSummary {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.set_state(OrchestratorState::Running);

        if !self.registry.is_initialized().await {
            self.registry.initialize().await;
        }
        let collectors = self.registry.enabled_collectors().await;
        tracing::info!(
            %cycle_id,
            trigger = trigger.as_str(),
            collectors = collectors.len(),
            "orchestrator: cycle starting"
        );

        let run_id = match self.repo.start_run(cycle_id, trigger.as_str(), started_at).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(%cycle_id, error = %e, "orchestrator: could not open run ledger row");
                None
            }
        };

        let deadline = self.collector_timeout;
        let handles: Vec<_> = collectors
            .into_iter()
            .map(|collector| {
                let name = collector.name();
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(deadline, collector.run()).await {
                        Ok(result) => result,
                        Err(_) => {
                            let err = CollectError::DeadlineExceeded {
                                secs: deadline.as_secs(),
                            };
                            tracing::error!(collector = name, error = %err, "orchestrator: collector timed out");
                            CollectorResult::failed(name, Outcome::CollectFailed, &err, 0, 0, deadline)
                        }
                    }
                });
                (name, handle)
            })
            .collect();

        let mut per_collector = BTreeMap::new();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        panic_message(&*join_err.into_panic())
                    } else {
                        join_err.to_string()
                    };
                    tracing::error!(collector = name, reason = %reason, "orchestrator: collector task aborted");
                    CollectorResult::failed(
                        name,
                        Outcome::CollectFailed,
                        &CollectError::Panicked(reason),
                        0,
                        0,
                        Duration::ZERO,
                    )
                }
            };
            if result.error_kind == Some(ErrorKind::Auth) {
                self.registry.disable(name).await;
            }
            per_collector.insert(name.to_string(), result);
        }

        self.set_state(OrchestratorState::CompletedThisCycle);
        let summary = CycleSummary {
            cycle_id,
            trigger,
            started_at,
            finished_at: Utc::now(),
            per_collector,
        };

        if let Some(run_id) = run_id {
            if let Err(e) = self.repo.finish_run(run_id, &summary.to_run_outcome()).await {
                tracing::warn!(%cycle_id, run_id, error = %e, "orchestrator: could not close run ledger row");
            }
        }

        tracing::info!(
            %cycle_id,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            items_saved = summary.items_saved(),
            status = summary.status().as_str(),
            "orchestrator: cycle complete"
        );
        self.set_state(OrchestratorState::Idle);
        summary
    }
}
