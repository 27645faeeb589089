//! Errant GTID detection
//!
//! A GTID is errant on the root when the root has applied it but none of its
//! direct sources has. The union of the sources' sets is built locally; the
//! difference is computed by the root server so that MySQL's own set
//! semantics decide the answer.

use std::fmt;

use uuid::Uuid;

use crate::errors::{FixerError, FixerResult, Stage};
use crate::gtid::{GtidEntry, GtidSet, Interval};
use crate::node::{Connector, Credentials, NodeConnection};
use crate::observability::{log_event_with_fields, Event};
use crate::topology::Topology;

/// GTIDs from one origin that no source has, annotated for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrantEntry {
    pub source: Uuid,
    pub intervals: Vec<Interval>,
    /// Identity of the topology node owning `source`, if known.
    pub server_id: Option<u32>,
    pub host: Option<String>,
}

impl ErrantEntry {
    pub fn gtid(&self) -> GtidEntry {
        GtidEntry::new(self.source, self.intervals.clone())
    }
}

/// ` errant_gtid <uuid:intervals>: server_id: <id>, host <host>`
impl fmt::Display for ErrantEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " errant_gtid {}: server_id: ", self.gtid())?;
        match self.server_id {
            Some(id) => write!(f, "{}", id)?,
            None => f.write_str("unknown")?,
        }
        write!(f, ", host {}", self.host.as_deref().unwrap_or("unknown"))
    }
}

/// Result of one detection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrantReport {
    entries: Vec<ErrantEntry>,
}

impl ErrantReport {
    pub fn new(entries: Vec<ErrantEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ErrantEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Origin UUIDs carrying errant GTIDs, first-seen order.
    pub fn sources(&self) -> Vec<Uuid> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.source) {
                seen.push(entry.source);
            }
        }
        seen
    }

    /// The errant GTIDs as a set.
    pub fn as_set(&self) -> GtidSet {
        GtidSet::from_entries(self.entries.iter().map(ErrantEntry::gtid).collect())
    }
}

/// Computes errant GTIDs for the root of a topology.
pub struct ErrantSetCalculator;

impl ErrantSetCalculator {
    /// `subject - union(upstream)`, evaluated by the server behind `conn`.
    ///
    /// Entries keep the order the server returned them in; one origin may
    /// appear in several entries.
    pub fn compute<N: NodeConnection>(
        conn: &mut N,
        subject: &GtidSet,
        upstream: &[GtidSet],
        topology: &Topology,
    ) -> FixerResult<ErrantReport> {
        let union = upstream
            .iter()
            .fold(GtidSet::empty(), |acc, set| acc.union(set));

        let difference = conn
            .set_subtract(subject, &union)
            .map_err(|e| FixerError::from_node(Stage::Detect, e))?;

        let entries = difference
            .entries()
            .iter()
            .map(|entry| {
                let owner = topology.get(&entry.source());
                ErrantEntry {
                    source: entry.source(),
                    intervals: entry.intervals().to_vec(),
                    server_id: owner.and_then(|n| n.server_id),
                    host: owner.map(|n| n.display_host().to_string()),
                }
            })
            .collect();

        Ok(ErrantReport { entries })
    }

    /// Read every direct source's executed set live, then [`compute`].
    ///
    /// Each source is read over its own connection, closed before the next
    /// one is opened. A root without sources has nothing to compare against
    /// and yields an empty report without querying it.
    ///
    /// [`compute`]: ErrantSetCalculator::compute
    pub fn detect<C: Connector, N: NodeConnection>(
        conn: &mut N,
        connector: &C,
        credentials: &Credentials,
        topology: &Topology,
    ) -> FixerResult<ErrantReport> {
        let mut upstream = Vec::new();
        for child in topology.immediate_children() {
            let mut child_conn = connector
                .connect(&child.address, credentials)
                .map_err(|e| FixerError::from_node(Stage::Detect, e))?;
            let executed = child_conn
                .read_global_executed_set()
                .map_err(|e| FixerError::from_node(Stage::Detect, e))?;
            upstream.push(executed);
        }

        let report = if upstream.is_empty() {
            ErrantReport::default()
        } else {
            let subject = &topology.root().executed_gtid_set;
            Self::compute(conn, subject, &upstream, topology)?
        };

        if report.is_empty() {
            log_event_with_fields(
                Event::ErrantNotFound,
                &[("node", conn.address().to_string().as_str())],
            );
        } else {
            log_event_with_fields(
                Event::ErrantDetected,
                &[
                    ("node", conn.address().to_string().as_str()),
                    ("errant", report.as_set().to_string().as_str()),
                ],
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn test_entry_display_known_owner() {
        let entry = ErrantEntry {
            source: uuid(3),
            intervals: vec![Interval::new(1, 2).unwrap()],
            server_id: Some(30),
            host: Some("db3".into()),
        };
        assert_eq!(
            entry.to_string(),
            " errant_gtid 03030303-0303-0303-0303-030303030303:1-2: server_id: 30, host db3"
        );
    }

    #[test]
    fn test_entry_display_unknown_owner() {
        let entry = ErrantEntry {
            source: uuid(9),
            intervals: vec![Interval::single(7).unwrap()],
            server_id: None,
            host: None,
        };
        assert!(entry.to_string().ends_with(":7: server_id: unknown, host unknown"));
    }

    #[test]
    fn test_report_sources_dedup() {
        let make = |n: u8, start: u64| ErrantEntry {
            source: uuid(n),
            intervals: vec![Interval::single(start).unwrap()],
            server_id: None,
            host: None,
        };
        let report = ErrantReport {
            entries: vec![make(3, 1), make(4, 1), make(3, 5)],
        };
        assert_eq!(report.sources(), vec![uuid(3), uuid(4)]);
        assert_eq!(report.len(), 3);
        assert!(!report.is_empty());
    }
}
