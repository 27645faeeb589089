//! Repair phase machine
//!
//! - Phases are explicit and enumerable
//! - Every transition is checked against a fixed table
//! - A forbidden transition is an error, never silently ignored
//!
//! ```text
//! DISCOVER -> VALIDATE -> DETECT -> CLEAN
//!                           |
//!                           v
//!                         STOP -> RE_DISCOVER -> PLAN -> CONFIRM -> ABORT -> RESUME
//!                                                  |        |
//!                                                  +--------+-> APPLY -> RESUME
//! ```
//!
//! Once STOP has succeeded, every later phase may also move straight to
//! RESUME on failure. Any non-terminal phase may move to FAILED.

use std::fmt;

use crate::errors::{FixerError, FixerResult};
use crate::observability::Logger;

/// A phase of one repair run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    Discover,
    Validate,
    Detect,
    /// Nothing errant; terminal.
    Clean,
    Stop,
    Rediscover,
    Plan,
    Confirm,
    /// Operator declined.
    Abort,
    Apply,
    /// Replication restarted after STOP.
    Resume,
    /// Terminal.
    Failed,
}

impl RepairPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "DISCOVER",
            Self::Validate => "VALIDATE",
            Self::Detect => "DETECT",
            Self::Clean => "CLEAN",
            Self::Stop => "STOP",
            Self::Rediscover => "RE_DISCOVER",
            Self::Plan => "PLAN",
            Self::Confirm => "CONFIRM",
            Self::Abort => "ABORT",
            Self::Apply => "APPLY",
            Self::Resume => "RESUME",
            Self::Failed => "FAILED",
        }
    }

    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Clean | Self::Failed)
    }

    /// Replication on the root is (or may be) stopped in this phase.
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            Self::Stop | Self::Rediscover | Self::Plan | Self::Confirm | Self::Abort | Self::Apply
        )
    }

    pub fn can_transition_to(&self, next: RepairPhase) -> bool {
        use RepairPhase::*;

        if next == Failed {
            return !self.is_terminal();
        }
        if next == Resume {
            return self.is_stopped();
        }

        matches!(
            (self, next),
            (Discover, Validate)
                | (Validate, Detect)
                | (Detect, Clean)
                | (Detect, Stop)
                | (Stop, Rediscover)
                | (Rediscover, Plan)
                | (Plan, Confirm)
                | (Plan, Apply)
                | (Confirm, Abort)
                | (Confirm, Apply)
        )
    }

    /// Consume the current phase and return `next`, or a phase error.
    pub fn transition(self, next: RepairPhase) -> FixerResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(FixerError::Phase {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current phase plus every phase visited so far.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: RepairPhase,
    trace: Vec<RepairPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RepairPhase::Discover,
            trace: vec![RepairPhase::Discover],
        }
    }

    pub fn current(&self) -> RepairPhase {
        self.current
    }

    pub fn trace(&self) -> &[RepairPhase] {
        &self.trace
    }

    pub fn advance(&mut self, next: RepairPhase) -> FixerResult<()> {
        let from = self.current;
        self.current = from.transition(next)?;
        self.trace.push(next);
        Logger::info(
            "REPAIR_PHASE",
            &[("from", from.as_str()), ("to", next.as_str())],
        );
        Ok(())
    }

    /// Move to FAILED unless already terminal.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            Logger::info(
                "REPAIR_PHASE",
                &[("from", self.current.as_str()), ("to", "FAILED")],
            );
            self.current = RepairPhase::Failed;
            self.trace.push(RepairPhase::Failed);
        }
    }
}
