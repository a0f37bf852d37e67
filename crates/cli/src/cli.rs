//! Command-line definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "subgrab", version)]
#[command(about = "Search, rank and download subtitles from the Thunder index", long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true, env = "SUBGRAB_CONFIG", default_value = "subgrab.json")]
    pub config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print counters (searches, downloads, evaluations) in the Prometheus
    /// text format on stderr when the command exits
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the index and list candidates
    Search {
        query: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Search timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download a single subtitle for a query
    Download {
        query: String,

        /// Destination directory [default: save_dir from config]
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Pick the candidate at this zero-based position
        #[arg(long, conflicts_with = "id")]
        index: Option<usize>,

        /// Pick the candidate with this identity
        #[arg(long)]
        id: Option<String>,

        /// Do not fall back to the highest scored candidate
        #[arg(long)]
        no_best: bool,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        transfer: TransferArgs,

        /// Replace an existing file instead of picking a free name
        #[arg(long)]
        overwrite: bool,

        #[arg(long)]
        json: bool,
    },

    /// Search several queries and download selected results concurrently
    Batch {
        #[arg(required = true)]
        queries: Vec<String>,

        /// Destination root; each query gets its own sub-directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Select with --select/--select-id instead of prompting
        #[arg(long)]
        no_interactive: bool,

        /// Zero-based positions, e.g. "0,2,5" or "0-3,7"
        #[arg(long)]
        select: Option<String>,

        /// Candidate identities to select
        #[arg(long = "select-id")]
        select_ids: Vec<String>,

        /// Concurrent downloads per query [default: concurrency from config]
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..=20))]
        concurrency: Option<u16>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Watch directories and fetch subtitles for new videos
    Watch {
        /// Extra directories to watch besides the configured ones
        dirs: Vec<PathBuf>,

        /// Output directory for the extra directories
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Use quality evaluation for the extra directories
        #[arg(long)]
        ai: bool,
    },

    /// Evaluate the quality of a local subtitle file
    Evaluate {
        file: PathBuf,

        /// Use the LLM evaluator even when AI evaluation is disabled
        #[arg(long)]
        ai: bool,
    },

    /// Show or clear the download history
    History {
        #[arg(long)]
        clear: bool,

        #[arg(long)]
        json: bool,
    },

    /// List numbered episode files in a directory
    Episodes {
        dir: PathBuf,

        /// Also write the list to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration with secrets hidden
    Show,
    /// Print the configuration file path
    Path,
}

/// Result filtering shared by search commands.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Maximum results (1-200)
    #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u16).range(1..=200))]
    pub limit: u16,

    /// Minimum server score [default: min_score from config]
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Required language tag, e.g. zh-CN [default: language from config]
    #[arg(long)]
    pub lang: Option<String>,
}

/// Download tuning shared by download commands.
#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// Per-attempt download timeout in seconds [default: timeout from config]
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Retries after the first attempt [default: retries from config]
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retries: Option<u32>,
}
