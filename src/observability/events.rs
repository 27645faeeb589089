//! Observable repair events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events of a repair run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Discovery
    /// A node was visited and registered
    NodeDiscovered,
    /// A node was reached a second time and skipped
    TopologyDuplicateSkipped,
    /// A node reports no upstream source
    TopologyTopFound,

    // Detection
    /// Errant GTIDs found
    ErrantDetected,
    /// No errant GTIDs
    ErrantNotFound,

    // Replication control
    /// Applier stopped on the root
    ReplicationStopped,
    /// Applier restarted on the root
    ReplicationResumed,
    /// Applier could not be restarted (FATAL)
    ResumeFailed,

    // Operator
    /// Operator declined the purge plan
    ConfirmationDeclined,
    /// Confirmation skipped by force mode
    ConfirmationForced,

    // Apply
    /// A destructive statement is about to run
    ApplyStatement,
    /// APPLY failed mid-sequence (FATAL)
    ApplyFailed,
    /// Purge committed
    PurgeCommitted,
}

impl Event {
    /// Returns the event name string
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::NodeDiscovered => "NODE_DISCOVERED",
            Event::TopologyDuplicateSkipped => "TOPOLOGY_DUPLICATE_SKIPPED",
            Event::TopologyTopFound => "TOPOLOGY_TOP_FOUND",
            Event::ErrantDetected => "ERRANT_DETECTED",
            Event::ErrantNotFound => "ERRANT_NOT_FOUND",
            Event::ReplicationStopped => "REPLICATION_STOPPED",
            Event::ReplicationResumed => "REPLICATION_RESUMED",
            Event::ResumeFailed => "RESUME_FAILED",
            Event::ConfirmationDeclined => "CONFIRMATION_DECLINED",
            Event::ConfirmationForced => "CONFIRMATION_FORCED",
            Event::ApplyStatement => "APPLY_STATEMENT",
            Event::ApplyFailed => "APPLY_FAILED",
            Event::PurgeCommitted => "PURGE_COMMITTED",
        }
    }

    /// Events that leave replication in a state needing an operator
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ResumeFailed | Event::ApplyFailed)
    }

    /// Events worth a warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::TopologyDuplicateSkipped | Event::ErrantDetected | Event::ConfirmationForced
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
