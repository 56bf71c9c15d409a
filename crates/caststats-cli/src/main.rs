//! caststats - look up the stats shown on the cast stats frame

use anyhow::{Context, Result};
use caststats_aggregator::StatsService;
use caststats_common::init_logging;
use caststats_config::{ConfigLoader, CONFIG_PATH_ENV};
use clap::{Parser, ValueEnum};
use tracing::{debug, error, info};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Farcaster user id (fid) to look up
    fid: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<String>,

    /// Log level, overriding the configuration
    #[arg(short, long)]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The full record as pretty-printed JSON
    Json,
    /// The one-line frame summary
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = init_logging(config.logging.to_logging_config()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!("Starting caststats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded: {:?}", config);

    let service = StatsService::from_config(&config).context("Failed to build stats pipeline")?;

    let record = match service.get_stats_for(args.fid.as_deref()).await {
        Ok(record) => record,
        Err(e) => {
            error!("{}", e);
            return Err(e).context("Usage: caststats [OPTIONS] <FID>");
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => println!("{}", record.summary_line()),
    }

    debug!("Cache stats: {:?}", service.cache_stats());
    Ok(())
}
