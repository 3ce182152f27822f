//! CLI parser and command dispatch.

mod check;
mod export;
mod extract;
mod harvest;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::helpers::load_config;

/// Output format for exported records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Comma-separated with a header row
    Csv,
}

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Incremental harvester for infinite-scroll review feeds")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML)
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest one or more feeds until each converges
    Run {
        /// JSON file listing feeds ({"name", "url"} objects or bare URLs)
        #[arg(short, long)]
        feeds: Option<PathBuf>,
        /// Feed URL to harvest (repeatable)
        #[arg(short, long = "url")]
        urls: Vec<String>,
        /// Records to collect per feed
        #[arg(short, long)]
        target: Option<usize>,
        /// Feeds harvested concurrently
        #[arg(long)]
        concurrency: Option<usize>,
        /// SQLite database for harvested records
        #[arg(long, conflicts_with = "dry_run")]
        db: Option<String>,
        /// Keep records in memory only
        #[arg(long)]
        dry_run: bool,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract records from a saved snapshot
    Extract {
        /// HTML snapshot file
        snapshot: PathBuf,
        /// Source ID to stamp on records
        #[arg(short, long, default_value = "offline")]
        source: String,
        /// Maximum records to print
        #[arg(short, long, default_value = "200")]
        limit: usize,
    },

    /// Check a saved snapshot for anti-automation interstitials
    Check {
        /// HTML snapshot file
        snapshot: PathBuf,
    },

    /// Print stored records as JSON lines or CSV
    Export {
        /// Only records from this source
        #[arg(short, long)]
        source: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// SQLite database to read
        #[arg(long)]
        db: Option<String>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            feeds,
            urls,
            target,
            concurrency,
            db,
            dry_run,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            harvest::cmd_run(
                config,
                harvest::RunOptions {
                    feeds,
                    urls,
                    target,
                    concurrency,
                    db,
                    dry_run,
                    json,
                },
            )
            .await
        }
        Commands::Extract {
            snapshot,
            source,
            limit,
        } => extract::cmd_extract(&snapshot, &source, limit),
        Commands::Check { snapshot } => check::cmd_check(&snapshot),
        Commands::Export { source, format, db } => {
            let config = load_config(cli.config.as_deref())?;
            export::cmd_export(&config, db.as_deref(), source.as_deref(), format).await
        }
    }
}
