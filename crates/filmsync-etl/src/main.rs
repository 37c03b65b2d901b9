//! Filmsync ETL - Main entry point

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use filmsync_common::logging::{init_logging, LogConfig, LogLevel};
use tokio::signal;
use tracing::info;

use filmsync_etl::config::Config;
use filmsync_etl::extract::PgExtractor;
use filmsync_etl::load::EsLoader;
use filmsync_etl::pipeline::EtlPipeline;
use filmsync_etl::state::FileWatermarkStore;

/// PostgreSQL to Elasticsearch sync for the movie catalog
#[derive(Debug, Parser)]
#[command(name = "filmsync-etl", version, about)]
struct Cli {
    /// Run a single sync pass and exit instead of looping
    #[arg(long)]
    once: bool,

    /// Log at debug level regardless of LOG_LEVEL
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with configuration from environment
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _guard = init_logging(&log_config)?;

    info!("Starting Filmsync ETL");

    let config = Config::load()?;
    info!(
        elasticsearch = %config.elasticsearch.url,
        state_path = %config.etl.state_path.display(),
        poll_interval_secs = config.etl.poll_interval_secs,
        "Configuration loaded"
    );

    let connect_timeout = Duration::from_secs(config.etl.connect_timeout_secs);
    let pipeline = EtlPipeline::new(
        PgExtractor::new(config.database.url, connect_timeout),
        EsLoader::new(config.elasticsearch.url, connect_timeout),
        FileWatermarkStore::new(config.etl.state_path),
        Duration::from_secs(config.etl.poll_interval_secs),
    );

    if cli.once {
        pipeline.run_once().await?;
        return Ok(());
    }

    // Dropping the loop mid-run is safe: the watermark only moves after
    // a completed load.
    tokio::select! {
        _ = pipeline.run() => {},
        _ = shutdown_signal() => {},
    }

    info!("Filmsync ETL shut down");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
