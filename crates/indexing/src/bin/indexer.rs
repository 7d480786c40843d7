use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use content_indexer::{Indexer, IndexerOptions, RunOutcome};
use content_indexer_common::{config::SystemConfig, telemetry::init_tracing_with_level};
use content_indexer_storage::{SnapshotRepository, SolrSink};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Content repository to Solr indexer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Solr core URL, overrides sink.url
    #[arg(long, env = "INDEXER_SINK_URL")]
    sink_url: Option<String>,

    /// Documents per add request, overrides indexing.batch_size
    #[arg(long, env = "INDEXER_BATCH_SIZE")]
    batch_size: Option<usize>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the whole index once
    Run,
    /// Index on startup if the index is empty, then wait for Ctrl-C
    Serve,
    /// Print the indexing filter read from the repository
    Filter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(&cli.log_level)?;

    info!("📄 Using config: {}", cli.config);
    let config = load_config(&cli)?;
    debug!("Loaded config: {:#?}", config);

    let repository = Arc::new(SnapshotRepository::open(&config.repository.snapshot_path));
    let sink = Arc::new(SolrSink::new(&config.sink).context("Failed to create the Solr client")?);
    let indexer = Arc::new(Indexer::new(
        repository,
        sink,
        IndexerOptions::from_config(&config.indexing),
    ));

    match cli.command {
        Commands::Run => match indexer.run().await {
            RunOutcome::Completed { indexed, elapsed } => {
                info!("✅ Indexed {} documents in {:?}", indexed, elapsed);
            }
            RunOutcome::Aborted(e) => anyhow::bail!("Indexing aborted: {}", e),
            RunOutcome::RolledBack { error, submitted } => {
                anyhow::bail!("Indexing rolled back after {} documents: {}", submitted, error)
            }
        },
        Commands::Serve => {
            let startup = Arc::clone(&indexer).spawn_startup_check();
            info!("✨ Indexer running! Press Ctrl+C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            if !startup.is_finished() {
                warn!("Stopping while the startup indexing is still running");
            }
            startup.abort();
            info!("👋 Shutting down");
        }
        Commands::Filter => {
            let filter = indexer.load_filter().await?;
            println!("{}", filter);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<SystemConfig> {
    let mut config = if Path::new(&cli.config).exists() {
        SystemConfig::from_file(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config))?
    } else {
        warn!("Config file {} not found, using defaults", cli.config);
        SystemConfig::default()
    };

    if let Some(url) = &cli.sink_url {
        config.sink.url = url.clone();
    }
    if let Some(batch_size) = cli.batch_size {
        config.indexing.batch_size = batch_size;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }
    Ok(config)
}
