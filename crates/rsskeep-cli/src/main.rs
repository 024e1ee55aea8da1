mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rsskeep")]
#[command(about = "Incremental RSS/Atom archiver with file and Postgres sinks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll every configured feed until the run window elapses
    Run {
        /// Run window in days (fractional allowed); overrides RSSKEEP_RUN_DAYS
        #[arg(long)]
        days: Option<f64>,
        /// Write partition files only; never connect to the database
        #[arg(long)]
        no_db: bool,
        /// Perform a single pass and exit
        #[arg(long)]
        once: bool,
    },
    /// Insert partition-file records that are missing from the database
    Load,
    /// Derive gmt_date for stored rows that lack one
    BackfillGmt,
    /// List configured sources with their partition files
    Sources,
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = rsskeep_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Run { days, no_db, once } => {
            commands::run_ingest(&config, days, no_db, once).await
        }
        Commands::Load => commands::run_load(&config).await,
        Commands::BackfillGmt => commands::run_backfill(&config).await,
        Commands::Sources => commands::list_sources(&config).await,
        Commands::Migrate => commands::run_migrate(&config).await,
    }
}
