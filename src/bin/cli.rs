//! billwatch CLI
//!
//! Daemon entry point. Runs the scheduler when no subcommand is given.

use std::path::PathBuf;
use std::sync::Arc;

use billwatch::{
    error::Result,
    models::Config,
    pipeline::{CycleScheduler, PostFormatter},
    services::{FeedSource, HttpPublisher, IsGdShortener, LogPublisher, Publisher},
    storage::{BillStore, SqliteBillStore},
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// billwatch - Congressional Bill Watcher
#[derive(Parser, Debug)]
#[command(
    name = "billwatch",
    version,
    about = "Watches congressional bill feeds and posts newly found bills"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the watcher loop (default)
    Run {
        /// Log posts instead of publishing them
        #[arg(long)]
        dry_run: bool,

        /// Override scheduler.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override scheduler.interval_secs
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Validate the configuration file
    Validate,

    /// Show record store counts
    Status,
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is not up yet, so a failed load is reported after init below
    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let mut config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };
    config.apply_env();

    let command = cli.command.unwrap_or(Command::Run {
        dry_run: false,
        max_iterations: None,
        interval_secs: None,
    });

    match command {
        Command::Run {
            dry_run,
            max_iterations,
            interval_secs,
        } => {
            if let Some(n) = max_iterations {
                config.scheduler.max_iterations = n;
            }
            if let Some(secs) = interval_secs {
                config.scheduler.interval_secs = secs;
            }
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            run(config, dry_run).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} feeds, {} keywords, {} handles)",
                config.source.feeds.len(),
                config.source.keywords.len(),
                config.publisher.handles.len()
            );
        }

        Command::Status => {
            let store = SqliteBillStore::open(&config.database.path)?;
            let stats = store.stats().await?;

            log::info!("Database: {}", config.database.path.display());
            log::info!("Bills stored: {}", stats.total);
            log::info!("  posted:      {}", stats.posted);
            log::info!("  pending:     {}", stats.pending);
            log::info!("  skipped:     {}", stats.skipped);
            log::info!("  unshortened: {}", stats.unshortened);
        }
    }

    Ok(())
}

/// Wire the adapters together and run the scheduler until it stops.
async fn run(config: Config, dry_run: bool) -> Result<()> {
    let store = match SqliteBillStore::open(&config.database.path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!(
                "Cannot open record store at {}: {}",
                config.database.path.display(),
                e
            );
            return Err(e);
        }
    };

    let source = Arc::new(FeedSource::new(&config.source)?);
    let publisher: Arc<dyn Publisher> = if dry_run {
        log::info!("Dry run: posts will only be logged");
        Arc::new(LogPublisher)
    } else {
        Arc::new(HttpPublisher::new(
            &config.publisher,
            &config.source.user_agent,
        )?)
    };

    let mut scheduler = CycleScheduler::new(
        store,
        source,
        publisher,
        PostFormatter::from_config(&config.publisher),
        config.scheduler.clone(),
    );
    if config.shortener.enabled {
        let shortener = IsGdShortener::new(&config.shortener, &config.source.user_agent)?;
        scheduler = scheduler.with_shortener(Arc::new(shortener));
    } else {
        log::info!("Link shortening disabled");
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, finishing the current cycle");
            trigger.cancel();
        }
    });

    let summary = scheduler.run(shutdown).await?;
    log::info!("Done! {} bills posted", summary.posts);

    Ok(())
}
