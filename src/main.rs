//! gtid-errant-fixer entry point
//!
//! Parses arguments and runs the repair via `cli::run`, prints any error to
//! stderr and exits non-zero on failure. All logic lives in the library.

use gtid_errant_fixer::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
