use std::time::Duration;

use heimdal_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub mod collection_runs;
pub mod records;
pub mod repository;

pub use collection_runs::{
    create_collection_run, finish_collection_run, get_collection_run,
    list_collection_run_collectors, list_collection_runs, CollectionRunCollectorRow,
    CollectionRunRow, CollectorRunEntry, RunOutcome, RunStatus,
};
pub use records::{
    insert_engagement, insert_hashtag_trends, insert_seo_data, list_recent_engagement,
    list_recent_hashtag_trends, list_recent_seo_data, HashtagTrendRow, SeoDataRow,
    SocialEngagementRow,
};
pub use repository::{PgRepository, Repository};

// Resolved from crates/heimdal-db/, so this is the workspace-level migrations/ dir.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Connection limits for the shared Postgres pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl From<&AppConfig> for PoolConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("collection run not found")]
    NotFound,
    #[error("collection run {id} is not in expected status '{expected_status}'")]
    InvalidCollectionRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Opens the shared pool. The first connection is established eagerly so a
/// bad `DATABASE_URL` fails at startup.
///
/// # Errors
///
/// Returns [`sqlx::Error`] when no connection can be made within the acquire timeout.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Applies every embedded migration not yet recorded in `_sqlx_migrations`
/// and returns how many were pending.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails or a recorded
/// checksum no longer matches its file.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    let applied = applied_migration_versions(pool).await;
    let pending = MIGRATOR
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count();
    MIGRATOR.run(pool).await?;
    Ok(pending)
}

// The bookkeeping table is missing on a fresh database; that reads as "nothing applied".
async fn applied_migration_versions(pool: &PgPool) -> Vec<i64> {
    sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(pool)
        .await
        .unwrap_or_default()
}

/// Round-trips `SELECT 1` on a pooled connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] when the database cannot be reached.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// [`ping`] with the error lifted into [`DbError`], as used by `/health`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] when the database cannot be reached.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    Ok(ping(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_small() {
        assert_eq!(
            PoolConfig::default(),
            PoolConfig {
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_secs: 10,
            }
        );
    }

    #[test]
    fn migrations_are_embedded_in_order() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert_eq!(versions.len(), 2);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
