//! Topology snapshot
//!
//! A flat table of nodes keyed by server UUID. Each non-root node holds the
//! UUID of the node it was discovered from; nothing owns anything else, so
//! the table cannot contain reference cycles. A snapshot is only valid for
//! the pass that produced it.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::gtid::GtidSet;
use crate::node::{NodeAddress, ServerIdentity, StatusRow, ThreadState};

/// The replication channel a node's parent uses to pull from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationChannel {
    pub name: String,
    pub auto_position: bool,
    pub io_running: ThreadState,
    pub sql_running: ThreadState,
}

/// One server in the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub uuid: Uuid,
    pub address: NodeAddress,
    pub server_id: Option<u32>,
    /// Report host, or the host a downstream registered under.
    pub host: Option<String>,
    /// `None` for the root.
    pub channel: Option<ReplicationChannel>,
    pub executed_gtid_set: GtidSet,
    pub level: u32,
    /// Back-reference toward the root.
    pub parent: Option<Uuid>,
    /// Reports no upstream source of its own.
    pub is_top: bool,
}

impl Node {
    /// The node the walk starts from.
    pub fn root(identity: &ServerIdentity, address: NodeAddress) -> Self {
        Self {
            uuid: identity.server_uuid,
            address,
            server_id: Some(identity.server_id),
            host: identity.report_host.clone(),
            channel: None,
            executed_gtid_set: GtidSet::empty(),
            level: 0,
            parent: None,
            is_top: false,
        }
    }

    /// A source announced by `parent`'s status row.
    pub fn from_status(uuid: Uuid, row: &StatusRow, level: u32, parent: Uuid) -> Self {
        Self {
            uuid,
            address: row.source_address(),
            server_id: None,
            host: None,
            channel: Some(ReplicationChannel {
                name: row.channel_name.clone(),
                auto_position: row.auto_position,
                io_running: row.io_running,
                sql_running: row.sql_running,
            }),
            executed_gtid_set: GtidSet::empty(),
            level,
            parent: Some(parent),
            is_top: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Auto-position flag of the channel into this node; the root has none.
    pub fn auto_position(&self) -> Option<bool> {
        self.channel.as_ref().map(|c| c.auto_position)
    }

    /// Host for operator display.
    pub fn display_host(&self) -> &str {
        self.host.as_deref().unwrap_or(&self.address.host)
    }

    /// `host:port (channel 'x')` for error messages.
    pub fn describe(&self) -> String {
        match &self.channel {
            Some(channel) => format!("{} (channel '{}')", self.address, channel.name),
            None => self.address.to_string(),
        }
    }
}

/// A discovered replication tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    root: Uuid,
    nodes: BTreeMap<Uuid, Node>,
    /// Discovery order.
    order: Vec<Uuid>,
    tops: BTreeSet<Uuid>,
}

impl Topology {
    pub fn root_uuid(&self) -> Uuid {
        self.root
    }

    pub fn root(&self) -> &Node {
        // The builder always registers the root first.
        &self.nodes[&self.root]
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&Node> {
        self.nodes.get(uuid)
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.nodes.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|uuid| self.nodes.get(uuid))
    }

    pub fn uuids(&self) -> BTreeSet<Uuid> {
        self.nodes.keys().copied().collect()
    }

    /// Nodes discovered through `parent`, in discovery order.
    pub fn children_of(&self, parent: Uuid) -> Vec<&Node> {
        self.nodes().filter(|n| n.parent == Some(parent)).collect()
    }

    /// The root's direct sources: the edges a repair stops and resets.
    pub fn immediate_children(&self) -> Vec<&Node> {
        self.children_of(self.root)
    }

    /// `(child, parent)` pairs, sorted.
    pub fn edges(&self) -> BTreeSet<(Uuid, Uuid)> {
        self.nodes
            .values()
            .filter_map(|n| n.parent.map(|p| (n.uuid, p)))
            .collect()
    }

    /// Level of every node, keyed by UUID.
    pub fn levels(&self) -> BTreeMap<Uuid, u32> {
        self.nodes.values().map(|n| (n.uuid, n.level)).collect()
    }

    /// Nodes without an upstream source.
    pub fn tops(&self) -> Vec<&Node> {
        self.tops.iter().filter_map(|uuid| self.nodes.get(uuid)).collect()
    }
}

/// Accumulates one discovery pass. First registration of a UUID wins.
#[derive(Debug)]
pub struct TopologyBuilder {
    root: Uuid,
    nodes: BTreeMap<Uuid, Node>,
    order: Vec<Uuid>,
    tops: BTreeSet<Uuid>,
}

impl TopologyBuilder {
    pub fn new(root: Node) -> Self {
        let uuid = root.uuid;
        let mut nodes = BTreeMap::new();
        nodes.insert(uuid, root);
        Self {
            root: uuid,
            nodes,
            order: vec![uuid],
            tops: BTreeSet::new(),
        }
    }

    /// Register a node. Returns `false` and keeps the existing entry if the
    /// UUID is already known.
    pub fn register(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.uuid) {
            return false;
        }
        self.order.push(node.uuid);
        self.nodes.insert(node.uuid, node);
        true
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&Node> {
        self.nodes.get(uuid)
    }

    pub fn set_executed(&mut self, uuid: &Uuid, set: GtidSet) {
        if let Some(node) = self.nodes.get_mut(uuid) {
            node.executed_gtid_set = set;
        }
    }

    pub fn mark_top(&mut self, uuid: &Uuid) {
        if let Some(node) = self.nodes.get_mut(uuid) {
            node.is_top = true;
            self.tops.insert(*uuid);
        }
    }

    /// Fill server id and host from what a node reported about itself.
    pub fn apply_identity(&mut self, identity: &ServerIdentity) {
        if let Some(node) = self.nodes.get_mut(&identity.server_uuid) {
            node.server_id = Some(identity.server_id);
            if identity.report_host.is_some() {
                node.host = identity.report_host.clone();
            }
        }
    }

    /// Fill identity announced by a registered replica. Never overwrites.
    /// Returns whether a node matched.
    pub fn merge_registered(&mut self, uuid: &Uuid, server_id: u32, host: &str) -> bool {
        match self.nodes.get_mut(uuid) {
            Some(node) => {
                node.server_id.get_or_insert(server_id);
                if node.host.is_none() && !host.is_empty() {
                    node.host = Some(host.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn build(self) -> Topology {
        Topology {
            root: self.root,
            nodes: self.nodes,
            order: self.order,
            tops: self.tops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    fn identity(n: u8) -> ServerIdentity {
        ServerIdentity {
            report_host: Some(format!("db{}", n)),
            server_id: n as u32,
            server_uuid: uuid(n),
        }
    }

    fn row(source: u8, auto_position: bool) -> StatusRow {
        StatusRow {
            channel_name: String::new(),
            auto_position,
            executed_gtid_set: GtidSet::empty(),
            source_host: format!("db{}", source),
            source_port: 3306,
            source_uuid: Some(uuid(source)),
            io_running: ThreadState::Running,
            sql_running: ThreadState::Running,
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let mut builder = TopologyBuilder::new(Node::root(&identity(1), NodeAddress::new("db1", 3306)));
        assert!(builder.register(Node::from_status(uuid(2), &row(2, true), 1, uuid(1))));

        let mut second = Node::from_status(uuid(2), &row(2, false), 2, uuid(3));
        second.address = NodeAddress::new("elsewhere", 3307);
        assert!(!builder.register(second));

        let topology = builder.build();
        let node = topology.get(&uuid(2)).unwrap();
        assert_eq!(node.level, 1);
        assert_eq!(node.parent, Some(uuid(1)));
        assert_eq!(node.auto_position(), Some(true));
        assert_eq!(node.address, NodeAddress::new("db2", 3306));
    }

    #[test]
    fn test_root_cannot_be_reregistered() {
        let mut builder = TopologyBuilder::new(Node::root(&identity(1), NodeAddress::new("db1", 3306)));
        assert!(!builder.register(Node::from_status(uuid(1), &row(1, true), 2, uuid(2))));
        let topology = builder.build();
        assert!(topology.root().is_root());
        assert_eq!(topology.len(), 1);
    }

    #[test]
    fn test_merge_registered_never_overwrites() {
        let mut builder = TopologyBuilder::new(Node::root(&identity(1), NodeAddress::new("db1", 3306)));
        builder.register(Node::from_status(uuid(2), &row(2, true), 1, uuid(1)));

        assert!(builder.merge_registered(&uuid(2), 22, "replica-two"));
        assert!(builder.merge_registered(&uuid(2), 99, "other"));
        assert!(!builder.merge_registered(&uuid(9), 9, "ghost"));

        let node = builder.get(&uuid(2)).unwrap();
        assert_eq!(node.server_id, Some(22));
        assert_eq!(node.display_host(), "replica-two");
    }

    #[test]
    fn test_children_edges_tops() {
        let mut builder = TopologyBuilder::new(Node::root(&identity(1), NodeAddress::new("db1", 3306)));
        builder.register(Node::from_status(uuid(2), &row(2, true), 1, uuid(1)));
        builder.register(Node::from_status(uuid(3), &row(3, true), 1, uuid(1)));
        builder.register(Node::from_status(uuid(4), &row(4, true), 2, uuid(2)));
        builder.mark_top(&uuid(3));
        builder.mark_top(&uuid(4));

        let topology = builder.build();
        let children: Vec<_> = topology.immediate_children().iter().map(|n| n.uuid).collect();
        assert_eq!(children, vec![uuid(2), uuid(3)]);
        assert_eq!(topology.edges().len(), 3);
        assert!(topology.edges().contains(&(uuid(4), uuid(2))));
        assert_eq!(topology.tops().len(), 2);
        assert_eq!(topology.levels()[&uuid(4)], 2);
    }

    #[test]
    fn test_describe() {
        let node = Node::from_status(uuid(2), &row(2, true), 1, uuid(1));
        assert_eq!(node.describe(), "db2:3306 (channel '')");
        let root = Node::root(&identity(1), NodeAddress::new("db1", 3306));
        assert_eq!(root.describe(), "db1:3306");
    }
}
