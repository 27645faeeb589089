//! Replication topology
//!
//! Discovery of the tree of sources above a node, and the auto-position
//! check that must pass before anything on that node is reset.

pub mod gate;
mod model;
mod walker;

pub use model::{Node, ReplicationChannel, Topology, TopologyBuilder};
pub use walker::TopologyWalker;
