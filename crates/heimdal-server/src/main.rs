mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use heimdal_collectors::{default_specs, CollectorRegistry, CycleRunner, CycleTrigger, Orchestrator};
use heimdal_db::{PgRepository, Repository};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(heimdal_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = heimdal_db::PoolConfig::from(config.as_ref());
    let pool = heimdal_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = heimdal_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool.clone()));
    let registry = Arc::new(CollectorRegistry::new(default_specs(&config, &repo)));
    let enabled = registry.initialize().await;
    if enabled.is_empty() {
        tracing::warn!("no collectors enabled; scheduled cycles will record empty runs");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        repo,
        Duration::from_secs(config.collector_timeout_secs),
    ));
    let trigger = CycleTrigger::new(Arc::clone(&orchestrator) as Arc<dyn CycleRunner>);
    let mut scheduler =
        scheduler::build_scheduler(trigger.clone(), &config.collection_schedule).await?;

    let app = build_app(AppState {
        pool,
        orchestrator,
        trigger: trigger.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "heimdal-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler: shutdown failed");
    }
    trigger.stop();
    tracing::info!("waiting for in-flight collection cycle to finish");
    trigger.wait_idle().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
