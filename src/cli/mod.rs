//! Command-line interface.

mod commands;

pub use commands::run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pricescout")]
#[command(about = "Hospital price transparency file discovery and validation")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for price files for eligible hospitals
    Search {
        /// Maximum hospitals to process (0 = all eligible)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Restrict to these state codes (can repeat)
        #[arg(short, long)]
        states: Vec<String>,

        /// Concurrent hospitals (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Register hospitals from a JSON file
    Load {
        /// Path to a state-keyed or flat JSON hospital list
        file: PathBuf,
    },

    /// Show the status of one hospital
    Status {
        /// Hospital ID
        hospital_id: String,
    },

    /// Export the best validated file per hospital, grouped by state
    Export {
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print aggregate statistics
    Stats {
        /// Also write the statistics as JSON to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
}
