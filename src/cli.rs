use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bitforge")]
#[command(author, version, about = "Bulk media ingestion with resumable checkpoints")]
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
    /// Process the next batch of files referenced by a manifest
    Process {
        /// XML manifest referencing the files
        #[arg(required = true)]
        manifest: PathBuf,

        /// Directory relative manifest paths are resolved against
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory derivatives are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Number of worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Directory for checkpoint lists and result snapshots
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Keep taking batches until nothing remains or a batch fails
        #[arg(long)]
        until_done: bool,
    },

    /// Show checkpoint progress for a manifest
    Status {
        /// XML manifest referencing the files
        #[arg(required = true)]
        manifest: PathBuf,

        /// Directory relative manifest paths are resolved against
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory for checkpoint lists and result snapshots
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Stop and remove the conversion service container
    StopService,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
