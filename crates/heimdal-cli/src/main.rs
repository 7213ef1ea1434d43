mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "heimdal-cli")]
#[command(about = "Heimdal operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one collection cycle in the foreground and print its summary
    Collect,
    /// List recent collection runs
    Runs {
        /// Number of runs to show (1-500)
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = heimdal_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool =
        heimdal_db::connect_pool(&config.database_url, heimdal_db::PoolConfig::from(&config))
            .await?;

    match cli.command {
        Commands::Migrate => commands::run_migrate(&pool).await,
        Commands::Collect => commands::run_collect(pool, config).await,
        Commands::Runs { limit } => commands::run_list_runs(&pool, limit).await,
    }
}
