//! Command-line boundary
//!
//! Parses flags, loads the JSON configuration, wires the MySQL connector,
//! the audit log and the stdin confirmation prompt into one repair run.

mod args;
mod commands;
mod errors;
mod io;

pub use args::Cli;
pub use commands::{repair, run, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::StdinConfirmer;
