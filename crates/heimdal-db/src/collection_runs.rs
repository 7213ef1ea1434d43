//! Database operations for `collection_runs` and `collection_run_collectors`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `collection_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_saved: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `collection_run_collectors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunCollectorRow {
    pub id: i64,
    pub collection_run_id: i64,
    pub collector: String,
    pub outcome: String,
    pub success: bool,
    pub items: i32,
    pub skipped: i32,
    pub duration_ms: i64,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Write inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    /// At least one collector failed and at least one succeeded.
    Partial,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

/// One collector's result as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorRunEntry {
    pub collector: String,
    /// `saved`, `no_op`, `collect_failed` or `save_failed`.
    pub outcome: &'static str,
    pub success: bool,
    pub items: i32,
    pub skipped: i32,
    pub duration_ms: i64,
    pub error_kind: Option<&'static str>,
    pub error_message: Option<String>,
}

/// Everything written when a run finishes.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub completed_at: DateTime<Utc>,
    pub items_saved: i32,
    pub error_message: Option<String>,
    pub collectors: Vec<CollectorRunEntry>,
}

// ---------------------------------------------------------------------------
// collection_runs operations
// ---------------------------------------------------------------------------

/// Creates a new collection run in `running` status.
///
/// `public_id` is the cycle id handed out by the orchestrator, so log lines
/// and ledger rows share one identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_collection_run(
    pool: &PgPool,
    public_id: Uuid,
    trigger_source: &str,
    started_at: DateTime<Utc>,
) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "INSERT INTO collection_runs (public_id, trigger_source, status, started_at) \
         VALUES ($1, $2, 'running', $3) \
         RETURNING id, public_id, trigger_source, status, started_at, completed_at, \
                   items_saved, error_message, created_at",
    )
    .bind(public_id)
    .bind(trigger_source)
    .bind(started_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Writes the per-collector rows and moves the run out of `running`, in one
/// transaction.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if any statement fails. Nothing is written
/// in either case.
pub async fn finish_collection_run(
    pool: &PgPool,
    id: i64,
    outcome: &RunOutcome,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = $1, completed_at = $2, items_saved = $3, error_message = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(outcome.status.as_str())
    .bind(outcome.completed_at)
    .bind(outcome.items_saved)
    .bind(outcome.error_message.as_deref())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        });
    }

    for entry in &outcome.collectors {
        sqlx::query(
            "INSERT INTO collection_run_collectors \
                 (collection_run_id, collector, outcome, success, items, skipped, \
                  duration_ms, error_kind, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(&entry.collector)
        .bind(entry.outcome)
        .bind(entry.success)
        .bind(entry.items)
        .bind(entry.skipped)
        .bind(entry.duration_ms)
        .bind(entry.error_kind)
        .bind(entry.error_message.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, trigger_source, status, started_at, completed_at, \
                items_saved, error_message, created_at \
         FROM collection_runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, ordered by `started_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, trigger_source, status, started_at, completed_at, \
                items_saved, error_message, created_at \
         FROM collection_runs \
         ORDER BY started_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the collector rows for the given runs, ordered by run then collector name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_run_collectors(
    pool: &PgPool,
    run_ids: &[i64],
) -> Result<Vec<CollectionRunCollectorRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunCollectorRow>(
        "SELECT id, collection_run_id, collector, outcome, success, items, skipped, \
                duration_ms, error_kind, error_message, created_at \
         FROM collection_run_collectors \
         WHERE collection_run_id = ANY($1) \
         ORDER BY collection_run_id DESC, collector",
    )
    .bind(run_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
