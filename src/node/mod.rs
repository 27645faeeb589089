//! Node connection boundary
//!
//! The core only talks to servers through [`NodeConnection`] and opens new
//! sessions through [`Connector`]. `mysql` provides the production
//! implementation; tests substitute an in-memory cluster.

mod connection;
mod errors;
pub mod mysql;
mod types;

pub use connection::{Connector, NodeConnection};
pub use errors::{NodeError, NodeErrorKind, NodeResult};
pub use mysql::{MysqlConnection, MysqlConnector, Terminology};
pub use types::{
    Credentials, NodeAddress, RegisteredReplica, ServerIdentity, StatusRow, ThreadState,
};
