//! Auto-position consistency gate
//!
//! Resetting the root's binary log history is only safe when every channel
//! it replicates through resumes by GTID rather than by file position.

use crate::errors::{FixerError, FixerResult};

use super::model::{Node, Topology};

/// True iff every immediate child of the root reports auto-position.
///
/// Vacuously true for a root with no sources.
pub fn auto_position_consistent(topology: &Topology) -> bool {
    auto_position_violations(topology).is_empty()
}

/// Immediate children whose channel does not use auto-position.
pub fn auto_position_violations(topology: &Topology) -> Vec<&Node> {
    topology
        .immediate_children()
        .into_iter()
        .filter(|node| node.auto_position() != Some(true))
        .collect()
}

/// Refuse to continue unless every channel into the root uses auto-position.
pub fn check(topology: &Topology) -> FixerResult<()> {
    let violations: Vec<String> = auto_position_violations(topology)
        .into_iter()
        .map(Node::describe)
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(FixerError::Precondition { violations })
    }
}
