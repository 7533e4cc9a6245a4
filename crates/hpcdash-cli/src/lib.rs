//! CLI argument parsing for hpcdash.

pub mod settings;

pub use settings::{Settings, SettingsError};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hpcdash")]
#[command(about = "Collect and parse HPC cluster state for a dashboard")]
pub struct Args {
    /// Settings file (JSON); built-in defaults apply when it does not exist
    #[arg(long, default_value = "config/dashboard.json")]
    pub config: Utf8PathBuf,

    /// Directory for raw collector output
    #[arg(long)]
    pub logs_dir: Option<Utf8PathBuf>,

    /// Module category catalog
    #[arg(long)]
    pub catalog: Option<Utf8PathBuf>,

    /// Concurrent `module spider` lookups
    #[arg(long)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run collectors whose output is out of date
    Refresh {
        /// Run every collector regardless of age
        #[arg(long)]
        force: bool,
    },

    /// Print module families by category
    Modules(OutputArgs),

    /// Print partition availability and cluster load
    Partitions(OutputArgs),

    /// Print disk usage for the configured mounts
    Quotas(OutputArgs),

    /// Assign a category to a module family (or `prefix/`)
    Categorize { family: String, category: String },

    /// Refresh periodically until interrupted
    Watch {
        /// Seconds between refresh passes
        #[arg(long, default_value = "60")]
        interval: u64,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct OutputArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
