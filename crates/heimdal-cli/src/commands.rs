//! Command handlers for the CLI.
//!
//! Called from `main` once config is loaded and the pool is connected.

use std::sync::Arc;
use std::time::Duration;

use heimdal_collectors::{default_specs, CollectorRegistry, CycleSource, Orchestrator};
use heimdal_core::AppConfig;
use heimdal_db::{CollectionRunRow, PgRepository, Repository, RunStatus};
use sqlx::PgPool;

const MAX_RUNS_LIMIT: i64 = 500;

pub(crate) async fn run_migrate(pool: &PgPool) -> anyhow::Result<()> {
    let applied = heimdal_db::run_migrations(pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

/// Runs one cycle through the same orchestrator the server uses and prints
/// the summary as JSON on stdout.
///
/// # Errors
///
/// Returns an error when every collector in the cycle failed, so scripts can
/// rely on the exit status.
pub(crate) async fn run_collect(pool: PgPool, config: AppConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool));
    let registry = Arc::new(CollectorRegistry::new(default_specs(&config, &repo)));
    let enabled = registry.initialize().await;
    tracing::info!(collectors = ?enabled, "collect: registry initialized");

    let orchestrator = Orchestrator::new(
        registry,
        repo,
        Duration::from_secs(config.collector_timeout_secs),
    );
    let summary = orchestrator.run_cycle(CycleSource::Cli).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.status() == RunStatus::Failed {
        anyhow::bail!(
            "collection cycle {} failed for all {} collector(s)",
            summary.cycle_id,
            summary.failed()
        );
    }
    Ok(())
}

pub(crate) async fn run_list_runs(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = heimdal_db::list_collection_runs(pool, limit.clamp(1, MAX_RUNS_LIMIT)).await?;
    if runs.is_empty() {
        println!("no collection runs recorded");
        return Ok(());
    }
    for run in &runs {
        println!("{}", format_run_line(run));
    }
    Ok(())
}

fn format_run_line(run: &CollectionRunRow) -> String {
    let finished = run
        .completed_at
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
    let mut line = format!(
        "{}  {:<9}  {:<10}  started {}  finished {}  items {}",
        run.public_id,
        run.trigger_source,
        run.status,
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        finished,
        run.items_saved,
    );
    if let Some(message) = &run.error_message {
        line.push_str("  error: ");
        line.push_str(message);
    }
    line
}
