//! Node connection error types
//!
//! Raised at the connection boundary. Callers attach the stage that was
//! running when they lift these into `FixerError`.

use std::fmt;

use super::types::NodeAddress;

/// Node error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    /// Error kind
    pub kind: NodeErrorKind,
    /// Node the call was addressed to
    pub address: NodeAddress,
    /// Error message
    pub message: String,
}

/// Node error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeErrorKind {
    /// Node unreachable or connection lost
    Connection,

    /// Statement rejected, or the reply could not be interpreted
    Query,
}

impl NodeError {
    /// Create a new node error.
    pub fn new(kind: NodeErrorKind, address: &NodeAddress, message: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.clone(),
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(address: &NodeAddress, message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::Connection, address, message)
    }

    /// Create a query error for a statement.
    pub fn query(address: &NodeAddress, statement: &str, message: impl fmt::Display) -> Self {
        Self::new(
            NodeErrorKind::Query,
            address,
            format!("{}: {}", statement, message),
        )
    }

    /// Create an error for a reply that does not have the expected shape.
    pub fn malformed(address: &NodeAddress, message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::Query, address, message)
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeError({:?}) at {}: {}", self.kind, self.address, self.message)
    }
}

impl std::error::Error for NodeError {}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
