//! Values exchanged with a node

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gtid::GtidSet;

/// `host:port` of a MySQL server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Login used for every node visit.
///
/// Always supplied by the operator, never read from a node.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// State of a replication thread as reported by the status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    Running,
    Connecting,
    Stopped,
}

impl ThreadState {
    /// Interpret `Yes` / `Connecting` / `No`.
    pub fn from_status(value: &str) -> Self {
        match value.trim() {
            v if v.eq_ignore_ascii_case("yes") => Self::Running,
            v if v.eq_ignore_ascii_case("connecting") => Self::Connecting,
            _ => Self::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// One row of the node's own replication status: an edge to one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub channel_name: String,
    pub auto_position: bool,
    /// The reporting node's own executed set.
    pub executed_gtid_set: GtidSet,
    pub source_host: String,
    pub source_port: u16,
    /// Unset until the IO thread has connected at least once.
    pub source_uuid: Option<Uuid>,
    pub io_running: ThreadState,
    pub sql_running: ThreadState,
}

impl StatusRow {
    pub fn source_address(&self) -> NodeAddress {
        NodeAddress::new(self.source_host.clone(), self.source_port)
    }
}

/// A replica that has registered itself with the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredReplica {
    pub server_id: u32,
    pub host: String,
    pub uuid: Uuid,
}

/// What a node says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub report_host: Option<String>,
    pub server_id: u32,
    pub server_uuid: Uuid,
}
