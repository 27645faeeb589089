//! Connection traits the core is written against

use crate::gtid::GtidSet;

use super::errors::NodeResult;
use super::types::{Credentials, NodeAddress, RegisteredReplica, ServerIdentity, StatusRow};

/// Administrative operations on one node.
///
/// A connection is closed when dropped.
pub trait NodeConnection {
    /// Address this connection was opened against.
    fn address(&self) -> &NodeAddress;

    /// The node's own replication status, one row per channel.
    fn read_own_status(&mut self) -> NodeResult<Vec<StatusRow>>;

    /// Replicas that registered themselves with this node.
    fn read_registered_replicas(&mut self) -> NodeResult<Vec<RegisteredReplica>>;

    /// `@@global.gtid_executed`.
    fn read_global_executed_set(&mut self) -> NodeResult<GtidSet>;

    /// Report host, server id and server UUID.
    fn read_server_identity(&mut self) -> NodeResult<ServerIdentity>;

    /// Server-side `a - b`.
    fn set_subtract(&mut self, a: &GtidSet, b: &GtidSet) -> NodeResult<GtidSet>;

    /// Stop the replication applier on every channel.
    fn stop_applier(&mut self) -> NodeResult<()>;

    /// Start the replication applier on every channel.
    fn start_applier(&mut self) -> NodeResult<()>;

    /// Clear the applied-position bookkeeping. Destructive.
    fn reset_applier(&mut self) -> NodeResult<()>;

    /// Clear the local binary log history. Destructive.
    fn reset_source(&mut self) -> NodeResult<()>;

    /// Declare `set` as already applied. Only valid right after `reset_source`.
    fn set_purged(&mut self, set: &GtidSet) -> NodeResult<()>;
}

/// Opens connections to nodes found during discovery.
pub trait Connector {
    type Connection: NodeConnection;

    fn connect(
        &self,
        address: &NodeAddress,
        credentials: &Credentials,
    ) -> NodeResult<Self::Connection>;
}
