//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ferry - resumable mirror for a crate registry
#[derive(Parser)]
#[command(name = "ferry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resumable mirror for a crate registry")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format (log lines on stderr, result on stdout)
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Download every non-yanked crate version missing from the mirror
    Fetch(FetchArgs),

    /// Check mirrored archives against the index checksums
    Verify(VerifyArgs),

    /// Print the index shard path of crate names
    ShardPath {
        /// Crate names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show checkpoint progress per mode
    Status {
        /// State directory holding the checkpoints
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,
    },
}

/// Arguments shared by fetch and verify
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Registry index checkout
    #[arg(long, value_name = "DIR")]
    pub index: Option<PathBuf>,

    /// Archive tree of the mirror
    #[arg(long, value_name = "DIR")]
    pub archives: Option<PathBuf>,

    /// Where checkpoints and locks live
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Task queue capacity
    #[arg(long, value_name = "N")]
    pub queue: Option<usize>,

    /// Only process these crates (repeatable)
    #[arg(long = "crate", value_name = "NAME")]
    pub crates: Vec<String>,

    /// Append failures as JSON lines to this file
    #[arg(long, value_name = "PATH")]
    pub failures: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Download URL template ({crate}, {version}, {prefix}, {lowerprefix})
    #[arg(long, value_name = "TEMPLATE")]
    pub download_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Skip versions whose archive is not in the mirror
    #[arg(long)]
    pub skip_missing: bool,
}
