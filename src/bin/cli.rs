//! Bethowen Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use bethowen_crawler::{
    error::Result,
    models::Config,
    pipeline,
    storage::{CrawlStore, JsonlSink, LocalStore, ProductSink},
};

/// Bethowen catalog crawler
#[derive(Parser, Debug)]
#[command(
    name = "bethowen-crawler",
    version,
    about = "Crawls the Bethowen catalog into product records"
)]

struct Cli {
    /// Path to storage directory containing config and crawl state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog: discover categories, paginate, resolve products
    Run {
        /// Fail instead of re-discovering when no category snapshot exists
        #[arg(long)]
        skip_discovery: bool,
    },

    /// Reset the ledger, the category snapshot, and the product output
    Clean,

    /// Validate the configuration file
    Validate,

    /// Show current crawl state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Bethowen crawler starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Arc::new(Config::load_or_default(&config_path));

    match cli.command {
        Command::Run { skip_discovery } => {
            config.validate()?;

            let store: Arc<dyn CrawlStore> =
                Arc::new(LocalStore::open(&cli.storage_dir).await?);
            let sink: Arc<dyn ProductSink> = Arc::new(JsonlSink::new(&cli.storage_dir));

            let summary =
                pipeline::run_crawl(Arc::clone(&config), store, sink, skip_discovery).await?;

            if summary.blocked > 0 {
                log::warn!(
                    "{} categories stopped early (blocked); rerun resumes them",
                    summary.blocked
                );
            }
        }

        Command::Clean => {
            let store = LocalStore::open(&cli.storage_dir).await?;
            let sink = JsonlSink::new(&cli.storage_dir);
            pipeline::run_clean(&store, &sink).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            log::info!("✓ Config OK (crawler, endpoints, and selectors)");
        }

        Command::Info => {
            let store = LocalStore::open(&cli.storage_dir).await?;

            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Ledger entries: {}", store.ledger_len().await);

            match store.load_categories().await? {
                Some(snapshot) => {
                    log::info!(
                        "Category snapshot: {} categories, saved {}",
                        snapshot.count,
                        snapshot.saved_at
                    );
                }
                None => log::info!("No category snapshot found yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
