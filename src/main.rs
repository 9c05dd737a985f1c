//! Veil CLI - Main entry point.

use veil::cli::{Cli, Commands};
use veil::config::VeilConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => VeilConfig::from_file(path)?,
        None => VeilConfig::development(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if cli.json_logs {
        config.observability.json_logs = true;
    }

    match cli.command {
        Commands::Sync {
            full_reindex,
            with_producer,
        } => {
            if full_reindex {
                let summary = veil::run_full_reindex(config).await?;
                println!(
                    "Reindex complete: {} records in {} batches",
                    summary.records, summary.batches
                );
            } else {
                veil::run(config, with_producer).await?;
            }
        }

        Commands::Produce => {
            veil::run_producer(config).await?;
        }

        Commands::Version => {
            println!("veil {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
