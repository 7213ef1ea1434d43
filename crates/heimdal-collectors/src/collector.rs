//! The uniform collector contract.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use heimdal_core::RecordBatch;
use serde::{Serialize, Serializer};

use crate::error::{CollectError, ErrorKind};

/// Normalized records from one `collect` call plus the number of upstream
/// items that could not be mapped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub records: RecordBatch,
    pub skipped: usize,
}

impl Collection {
    #[must_use]
    pub fn new(records: impl Into<RecordBatch>, skipped: usize) -> Self {
        Self {
            records: records.into(),
            skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Saved,
    /// Nothing was collected, so nothing was saved.
    NoOp,
    CollectFailed,
    SaveFailed,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Saved => "saved",
            Outcome::NoOp => "no_op",
            Outcome::CollectFailed => "collect_failed",
            Outcome::SaveFailed => "save_failed",
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// What one collector run produced. Errors are recorded here, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorResult {
    pub collector: String,
    pub success: bool,
    /// Records collected (and, on success, saved).
    pub items: usize,
    pub skipped: usize,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl CollectorResult {
    #[must_use]
    pub fn failed(
        collector: impl Into<String>,
        outcome: Outcome,
        error: &CollectError,
        items: usize,
        skipped: usize,
        duration: Duration,
    ) -> Self {
        Self {
            collector: collector.into(),
            success: false,
            items,
            skipped,
            duration,
            outcome,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    fn succeeded(
        collector: &str,
        outcome: Outcome,
        items: usize,
        skipped: usize,
        duration: Duration,
    ) -> Self {
        Self {
            collector: collector.to_string(),
            success: true,
            items,
            skipped,
            duration,
            outcome,
            error: None,
            error_kind: None,
        }
    }
}

/// One upstream platform's collect → save lifecycle.
///
/// Implementors provide `collect` and `save`; `run` sequences them and turns
/// every failure, including a panic inside either step, into a
/// [`CollectorResult`].
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable name used for logging, summaries and the run ledger.
    fn name(&self) -> &'static str;

    /// Fetches from the source and maps raw items to normalized records.
    ///
    /// A malformed item is skipped and counted. An empty collection is not an error.
    async fn collect(&self) -> Result<Collection, CollectError>;

    /// Persists `records` atomically, returning the number of rows written.
    async fn save(&self, records: &RecordBatch) -> Result<u64, CollectError>;

    async fn run(&self) -> CollectorResult {
        let name = self.name();
        let started = Instant::now();
        tracing::info!(collector = name, "collector: starting run");

        let collected = match AssertUnwindSafe(self.collect()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CollectError::Panicked(panic_message(&*panic))),
        };
        let collection = match collected {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(collector = name, error = %e, kind = %e.kind(), "collector: collect failed");
                return CollectorResult::failed(
                    name,
                    Outcome::CollectFailed,
                    &e,
                    0,
                    0,
                    started.elapsed(),
                );
            }
        };

        let items = collection.records.len();
        if items == 0 {
            tracing::warn!(
                collector = name,
                skipped = collection.skipped,
                "collector: nothing collected"
            );
            return CollectorResult::succeeded(
                name,
                Outcome::NoOp,
                0,
                collection.skipped,
                started.elapsed(),
            );
        }

        let saved = match AssertUnwindSafe(self.save(&collection.records))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(CollectError::Panicked(panic_message(&*panic))),
        };
        match saved {
            Ok(written) => {
                let duration = started.elapsed();
                tracing::info!(
                    collector = name,
                    items,
                    written,
                    skipped = collection.skipped,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "collector: run complete"
                );
                CollectorResult::succeeded(name, Outcome::Saved, items, collection.skipped, duration)
            }
            Err(e) => {
                tracing::error!(collector = name, items, error = %e, "collector: save failed");
                CollectorResult::failed(
                    name,
                    Outcome::SaveFailed,
                    &e,
                    items,
                    collection.skipped,
                    started.elapsed(),
                )
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
