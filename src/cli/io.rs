//! Operator console I/O

use std::io::{self, BufRead, Write};

use crate::repair::{is_affirmative, Confirmer, RepairPlan};

/// Asks on stdout and reads one line from stdin.
///
/// EOF, a read error or any answer other than `y`/`yes` is a decline.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&mut self, _plan: &RepairPlan) -> bool {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "\nWould you continue to reset? [y/N] ");
        let _ = stdout.flush();

        read_answer(&mut io::stdin().lock())
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> bool {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) => is_affirmative(&line),
    }
}
