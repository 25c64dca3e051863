//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reelwright - produce and publish short narrated story videos
#[derive(Parser, Debug)]
#[command(name = "reelwright")]
#[command(about = "Produce and publish short narrated story videos", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the discovered ones
    #[arg(long, global = true, env = "REELWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce one video
    Produce {
        /// Topic category, or "random"
        #[arg(long, default_value = "random")]
        topic: String,

        /// Theme within the category (picked at random when omitted)
        #[arg(long)]
        theme: Option<String>,

        /// Stop after composing; publish later with `publish`
        #[arg(long)]
        no_upload: bool,

        /// Same as --no-upload
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a batch of productions under the daily ceiling
    Schedule {
        /// Productions per batch (defaults to scheduler.batch_size)
        #[arg(long)]
        count: Option<usize>,

        /// Keep running batches on the configured schedule until interrupted
        #[arg(long)]
        periodic: bool,
    },

    /// Continue an interrupted production from its checkpoint
    Resume {
        /// Record id
        id: String,
    },

    /// Upload a finished dry run
    Publish {
        /// Record id of the dry run
        id: String,
    },

    /// Print recent records as JSON lines, newest first
    History {
        /// Maximum number of records
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Print quota consumption per provider as JSON lines
    Quota,

    /// Queue story ideas drawn from trending videos
    Trends {
        /// Print the queued ideas instead of refreshing
        #[arg(long)]
        list: bool,
    },
}
