use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelstitch")]
#[command(author, version, about = "Media segment merge orchestrator")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge local media segments through the full pipeline
    Merge {
        /// Segments to merge, in order
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output file name (canonical extension appended if missing)
        #[arg(short, long, default_value = "merged")]
        output: String,

        /// Directory the delivered artifact lands in
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },

    /// Probe a media file and display its concat-relevant streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Show recent merges for a requester
    History {
        /// Requester id
        #[arg(default_value = "0")]
        requester: i64,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Display version information
    Version,
}
