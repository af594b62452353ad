//! Command-line interface for equalizer

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "equalizer")]
#[command(about = "Reconcile a source table against a target table")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Work directory holding inputs and receiving outputs (defaults to the current directory)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Level the logger itself filters at
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile source data against target data and write the four result tables
    Run {
        /// Source table spec (JSON)
        #[arg(long)]
        source_spec: PathBuf,

        /// Target table spec (JSON)
        #[arg(long)]
        target_spec: PathBuf,

        /// Source table data (JSON, row or columnar)
        #[arg(long)]
        source_data: PathBuf,

        /// Target table data (JSON, row or columnar)
        #[arg(long)]
        target_data: PathBuf,

        /// Pretty-print the output files
        #[arg(long)]
        pretty: bool,

        /// Match partitions on the calling thread only
        #[arg(long)]
        no_parallel: bool,

        /// Print the run report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Check whether two table specs can be reconciled
    Check {
        /// Source table spec (JSON)
        #[arg(long)]
        source_spec: PathBuf,

        /// Target table spec (JSON)
        #[arg(long)]
        target_spec: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Acquire, wait for or release a directory lock
    Lock {
        /// Directory holding the lock (defaults to the work dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Lock name; the lock entry is `<dir>/<name>.lock`
        #[arg(long)]
        name: String,

        /// Wait for the lock instead of failing when it is held
        #[arg(long, conflicts_with = "unlock")]
        wait: bool,

        /// Maximum wait in seconds (must be > 0)
        #[arg(long, default_value = "60", value_parser = validate_timeout)]
        timeout: u64,

        /// Release the lock
        #[arg(long)]
        unlock: bool,
    },
}

/// Validate that the lock timeout is greater than 0
fn validate_timeout(s: &str) -> Result<u64, String> {
    let timeout: u64 = s
        .parse()
        .map_err(|_| format!("Invalid timeout: '{}'. Must be a positive integer.", s))?;

    if timeout == 0 {
        return Err("Timeout must be greater than 0".to_string());
    }

    Ok(timeout)
}
