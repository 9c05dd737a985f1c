//! Command-line interface for veil.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Veil - continuous anonymizing replication for customer records.
#[derive(Parser)]
#[command(name = "veil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VEIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "VEIL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "VEIL_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the continuous sync daemon (listener + scheduled flusher)
    Sync {
        /// Re-copy the entire source once and exit instead of tailing
        /// the change feed
        #[arg(long)]
        full_reindex: bool,

        /// Also run the synthetic customer producer against the
        /// in-memory source
        #[arg(long)]
        with_producer: bool,
    },

    /// Run only the synthetic customer producer
    Produce,

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_flags_parse() {
        let cli = Cli::parse_from(["veil", "sync", "--full-reindex"]);
        match cli.command {
            Commands::Sync { full_reindex, with_producer } => {
                assert!(full_reindex);
                assert!(!with_producer);
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn test_global_flags_parse() {
        let cli = Cli::parse_from(["veil", "--log-level", "debug", "--json-logs", "produce"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Produce));
    }
}
