//! gtid-errant-fixer - find and purge errant GTIDs on a MySQL replica
//!
//! Walks the replication topology above a node, checks that every channel
//! into it uses GTID auto-positioning, computes the GTIDs the node applied
//! that none of its sources has, and with operator confirmation resets the
//! node's binary log history without them.

pub mod cli;
pub mod errors;
pub mod gtid;
pub mod node;
pub mod observability;
pub mod repair;
pub mod topology;
