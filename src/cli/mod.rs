//! CLI command definitions and parsing
use crate::collector::CollectionMethod;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vidsift",
    version,
    author = "neur0map",
    about = "Collect viral short videos and keep the locally authentic ones",
    long_about = "Vidsift triggers scrape jobs against a dataset provider, waits for the results, and runs \
                  every record through a multi-stage filter (recency, views, verified status, language, \
                  regional authenticity, quality). Accepted videos go to a CSV workbook and to timestamped \
                  JSON/CSV snapshots."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/vidsift/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a collection job, filter the results and store the accepted videos
    Collect {
        /// Where to collect from
        #[arg(short, long, value_enum, default_value_t = CollectionMethod::Hybrid)]
        method: CollectionMethod,

        /// Skip writing to the workbook
        #[arg(long)]
        no_sheets: bool,

        /// Skip JSON/CSV snapshots
        #[arg(long)]
        no_files: bool,
    },

    /// Filter previously collected records (JSON array or NDJSON file)
    Filter {
        /// Input file
        input: PathBuf,

        /// Skip writing to the workbook
        #[arg(long)]
        no_sheets: bool,

        /// Skip JSON/CSV snapshots
        #[arg(long)]
        no_files: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Also check the settings a collection run needs (dataset id, API key)
        #[arg(long)]
        collection: bool,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
