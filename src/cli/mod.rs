pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blogwatch")]
#[command(about = "Detect new posts on blogs via feeds and sitemaps", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/blogwatch/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database, overriding the configured location
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every configured blog on a fixed interval
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Override the configured interval (e.g., "1h", "30m", "1d")
        #[arg(short, long)]
        interval: Option<String>,
    },
    /// Check one blog now and print the result
    Check {
        /// Blog URL; configured blogs keep their name
        url: String,
    },
    /// Show recent checks of one blog
    History {
        /// Blog URL
        url: String,

        /// Number of rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// List the stored state of every blog
    State,
    /// Drop the stored state of one blog; its next check is an initial sync
    Forget {
        /// Blog URL
        url: String,
    },
}
