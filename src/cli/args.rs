//! CLI argument definitions using clap
//!
//! gtid-errant-fixer --config <path> [--monitor-user <user>]
//!                   [--monitor-password <password>] [-f|--force]

use clap::Parser;
use std::path::PathBuf;

/// Find and purge errant GTIDs on a MySQL replica
#[derive(Parser, Debug)]
#[command(name = "gtid-errant-fixer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./gtid-fixer.json")]
    pub config: PathBuf,

    /// User for every node other than the one being repaired
    #[arg(long)]
    pub monitor_user: Option<String>,

    /// Password for the monitor user
    #[arg(long)]
    pub monitor_password: Option<String>,

    /// Apply the purge plan without asking
    #[arg(short, long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
