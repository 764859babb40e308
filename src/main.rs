use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use activity_log::cli::{list, scan, stats, watch};
use activity_log::config::Config;
use activity_log::store::ActivityStore;

#[derive(Parser)]
#[command(name = "activity-log")]
#[command(about = "Incremental ingestion of AI coding-assistant transcripts into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest all existing transcripts once and exit
    Scan,

    /// Ingest existing transcripts, then follow changes until interrupted
    Watch,

    /// List recent sessions, those awaiting input first
    Sessions {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("activity_log=info".parse()?)
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(cli.config.as_deref())?;

    // Initialize store
    let store = Arc::new(ActivityStore::open(&config.database_path())?);

    match cli.command {
        Commands::Scan => {
            scan::run(store, &config)?;
        }
        Commands::Watch => {
            watch::run(store, &config).await?;
        }
        Commands::Sessions { limit } => {
            list::run(&store, limit, config.watcher.pending_max_age_days)?;
        }
        Commands::Stats => {
            stats::run(&store, config.watcher.pending_max_age_days)?;
        }
    }

    Ok(())
}
