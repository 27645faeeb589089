//! Purge plan
//!
//! Built from the executed set read after replication was stopped. Whole
//! tokens whose origin carries errant GTIDs are dropped; everything else is
//! declared purged again after the binary log reset.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use crate::gtid::GtidSet;
use crate::node::NodeAddress;
use crate::topology::Topology;

use super::errant::{ErrantEntry, ErrantReport};

/// A topology top shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSummary {
    pub address: NodeAddress,
    pub server_id: Option<u32>,
    pub channel: Option<String>,
}

/// What APPLY will do, fixed before the operator is asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    node: NodeAddress,
    frozen: GtidSet,
    errant: Vec<ErrantEntry>,
    tops: Vec<TopSummary>,
    purge: GtidSet,
}

impl RepairPlan {
    /// `frozen` minus every token whose origin appears in `errant`.
    pub fn build(frozen: &GtidSet, errant: &ErrantReport, topology: &Topology) -> Self {
        let sources: HashSet<Uuid> = errant.sources().into_iter().collect();
        let purge = frozen.without_sources(&sources);

        let tops = topology
            .tops()
            .into_iter()
            .map(|node| TopSummary {
                address: node.address.clone(),
                server_id: node.server_id,
                channel: node.channel.as_ref().map(|c| c.name.clone()),
            })
            .collect();

        Self {
            node: topology.root().address.clone(),
            frozen: frozen.clone(),
            errant: errant.entries().to_vec(),
            tops,
            purge,
        }
    }

    pub fn node(&self) -> &NodeAddress {
        &self.node
    }

    /// Executed set captured after STOP.
    pub fn frozen(&self) -> &GtidSet {
        &self.frozen
    }

    pub fn errant(&self) -> &[ErrantEntry] {
        &self.errant
    }

    pub fn tops(&self) -> &[TopSummary] {
        &self.tops
    }

    /// Value passed to `set-purged`.
    pub fn purge_set(&self) -> &GtidSet {
        &self.purge
    }
}

impl fmt::Display for RepairPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "original gtid_executed: ")?;
        writeln!(f, "{}", self.frozen)?;
        writeln!(f, "errant transactions: ")?;
        for entry in &self.errant {
            writeln!(f, "{}", entry)?;
        }
        writeln!(f, "topology tops: ")?;
        for top in &self.tops {
            write!(f, " {}", top.address)?;
            if let Some(id) = top.server_id {
                write!(f, " (server_id: {})", id)?;
            }
            if let Some(channel) = &top.channel {
                write!(f, " channel: '{}'", channel)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "gtid_purged to be set on {}: ", self.node)?;
        writeln!(f, "{}", self.purge)
    }
}
