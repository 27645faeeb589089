//! MySQL implementation of the connection boundary
//!
//! `mysql_async` is driven from a private current-thread tokio runtime so the
//! core stays a plain sequential program. No timeouts are set here; a stalled
//! server stalls the caller.

use std::sync::Arc;

use mysql_async::prelude::{FromValue, Queryable};
use mysql_async::{Conn, OptsBuilder, Row};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Runtime};
use uuid::Uuid;

use crate::gtid::GtidSet;

use super::connection::{Connector, NodeConnection};
use super::errors::{NodeError, NodeResult};
use super::types::{
    Credentials, NodeAddress, RegisteredReplica, ServerIdentity, StatusRow, ThreadState,
};

/// Which replication vocabulary the servers accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminology {
    /// `SHOW SLAVE STATUS`, `STOP SLAVE`, ... (5.7 and 8.0)
    #[default]
    Legacy,
    /// `SHOW REPLICA STATUS`, `STOP REPLICA`, ... (8.0.22+)
    Modern,
}

/// Statement texts for one terminology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statements {
    pub show_status: &'static str,
    pub show_replicas: &'static str,
    pub stop_applier: &'static str,
    pub start_applier: &'static str,
    pub reset_applier: &'static str,
    pub reset_source: &'static str,
}

pub const GLOBAL_EXECUTED_QUERY: &str = "SELECT @@global.gtid_executed";
pub const SERVER_IDENTITY_QUERY: &str = "SELECT @@report_host, @@server_id, @@server_uuid";
pub const GTID_SUBTRACT_QUERY: &str = "SELECT GTID_SUBTRACT(?, ?)";

impl Terminology {
    pub fn statements(&self) -> Statements {
        match self {
            Self::Legacy => Statements {
                show_status: "SHOW SLAVE STATUS",
                show_replicas: "SHOW SLAVE HOSTS",
                stop_applier: "STOP SLAVE",
                start_applier: "START SLAVE",
                reset_applier: "RESET SLAVE",
                reset_source: "RESET MASTER",
            },
            Self::Modern => Statements {
                show_status: "SHOW REPLICA STATUS",
                show_replicas: "SHOW REPLICAS",
                stop_applier: "STOP REPLICA",
                start_applier: "START REPLICA",
                reset_applier: "RESET REPLICA",
                reset_source: "RESET MASTER",
            },
        }
    }
}

/// `SET GLOBAL gtid_purged` for a typed set. The set's text form only
/// contains hex digits, digits, `-`, `:` and `,`.
pub fn set_purged_statement(set: &GtidSet) -> String {
    format!("SET GLOBAL gtid_purged = '{}'", set)
}

/// Opens `mysql_async` connections.
pub struct MysqlConnector {
    runtime: Arc<Runtime>,
    terminology: Terminology,
}

impl MysqlConnector {
    pub fn new(terminology: Terminology) -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            terminology,
        })
    }
}

impl Connector for MysqlConnector {
    type Connection = MysqlConnection;

    fn connect(
        &self,
        address: &NodeAddress,
        credentials: &Credentials,
    ) -> NodeResult<MysqlConnection> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(address.host.clone())
            .tcp_port(address.port)
            .user(Some(credentials.user.clone()))
            .pass(Some(credentials.password.clone()))
            .prefer_socket(false);

        let conn = self
            .runtime
            .block_on(Conn::new(opts))
            .map_err(|e| NodeError::connection(address, e.to_string()))?;

        Ok(MysqlConnection {
            address: address.clone(),
            runtime: Arc::clone(&self.runtime),
            statements: self.terminology.statements(),
            conn: Some(conn),
        })
    }
}

/// One open session. Disconnects on drop.
pub struct MysqlConnection {
    address: NodeAddress,
    runtime: Arc<Runtime>,
    statements: Statements,
    conn: Option<Conn>,
}

impl MysqlConnection {
    fn session(&mut self) -> NodeResult<&mut Conn> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(NodeError::connection(&self.address, "connection already closed")),
        }
    }

    fn rows(&mut self, statement: &'static str) -> NodeResult<Vec<Row>> {
        let runtime = Arc::clone(&self.runtime);
        let address = self.address.clone();
        let conn = self.session()?;
        runtime
            .block_on(conn.query::<Row, _>(statement))
            .map_err(|e| map_error(&address, statement, e))
    }

    fn execute(&mut self, statement: &str) -> NodeResult<()> {
        let runtime = Arc::clone(&self.runtime);
        let address = self.address.clone();
        let conn = self.session()?;
        runtime
            .block_on(conn.query_drop(statement))
            .map_err(|e| map_error(&address, statement, e))
    }
}

impl NodeConnection for MysqlConnection {
    fn address(&self) -> &NodeAddress {
        &self.address
    }

    fn read_own_status(&mut self) -> NodeResult<Vec<StatusRow>> {
        let statement = self.statements.show_status;
        let rows = self.rows(statement)?;
        rows.iter()
            .map(|row| status_row(&self.address, row))
            .collect()
    }

    fn read_registered_replicas(&mut self) -> NodeResult<Vec<RegisteredReplica>> {
        let statement = self.statements.show_replicas;
        let rows = self.rows(statement)?;
        rows.iter()
            .map(|row| registered_replica(&self.address, row))
            .collect()
    }

    fn read_global_executed_set(&mut self) -> NodeResult<GtidSet> {
        let runtime = Arc::clone(&self.runtime);
        let address = self.address.clone();
        let conn = self.session()?;
        let text = runtime
            .block_on(conn.query_first::<String, _>(GLOBAL_EXECUTED_QUERY))
            .map_err(|e| map_error(&address, GLOBAL_EXECUTED_QUERY, e))?
            .unwrap_or_default();
        parse_set(&address, &text)
    }

    fn read_server_identity(&mut self) -> NodeResult<ServerIdentity> {
        let runtime = Arc::clone(&self.runtime);
        let address = self.address.clone();
        let conn = self.session()?;
        let (report_host, server_id, server_uuid) = runtime
            .block_on(conn.query_first::<(Option<String>, u32, String), _>(SERVER_IDENTITY_QUERY))
            .map_err(|e| map_error(&address, SERVER_IDENTITY_QUERY, e))?
            .ok_or_else(|| NodeError::malformed(&address, "server identity query returned no row"))?;

        let server_uuid = Uuid::parse_str(server_uuid.trim()).map_err(|_| {
            NodeError::malformed(&address, format!("invalid @@server_uuid '{}'", server_uuid))
        })?;

        Ok(ServerIdentity {
            report_host: report_host.filter(|h| !h.is_empty()),
            server_id,
            server_uuid,
        })
    }

    fn set_subtract(&mut self, a: &GtidSet, b: &GtidSet) -> NodeResult<GtidSet> {
        let runtime = Arc::clone(&self.runtime);
        let address = self.address.clone();
        let conn = self.session()?;
        let text = runtime
            .block_on(conn.exec_first::<String, _, _>(
                GTID_SUBTRACT_QUERY,
                (a.to_string(), b.to_string()),
            ))
            .map_err(|e| map_error(&address, GTID_SUBTRACT_QUERY, e))?
            .unwrap_or_default();
        parse_set(&address, &text)
    }

    fn stop_applier(&mut self) -> NodeResult<()> {
        let statement = self.statements.stop_applier;
        self.execute(statement)
    }

    fn start_applier(&mut self) -> NodeResult<()> {
        let statement = self.statements.start_applier;
        self.execute(statement)
    }

    fn reset_applier(&mut self) -> NodeResult<()> {
        let statement = self.statements.reset_applier;
        self.execute(statement)
    }

    fn reset_source(&mut self) -> NodeResult<()> {
        let statement = self.statements.reset_source;
        self.execute(statement)
    }

    fn set_purged(&mut self, set: &GtidSet) -> NodeResult<()> {
        self.execute(&set_purged_statement(set))
    }
}

impl Drop for MysqlConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.runtime.block_on(conn.disconnect());
        }
    }
}

fn map_error(address: &NodeAddress, statement: &str, err: mysql_async::Error) -> NodeError {
    match err {
        mysql_async::Error::Io(e) => NodeError::connection(address, e.to_string()),
        other => NodeError::query(address, statement, other),
    }
}

fn parse_set(address: &NodeAddress, text: &str) -> NodeResult<GtidSet> {
    GtidSet::parse(text).map_err(|e| NodeError::malformed(address, e.message))
}

/// First present column among `names`; legacy name first, modern second.
fn column<T: FromValue>(row: &Row, names: &[&str]) -> Option<T> {
    names
        .iter()
        .find_map(|name| row.get_opt::<T, _>(*name).and_then(Result::ok))
}

fn status_row(address: &NodeAddress, row: &Row) -> NodeResult<StatusRow> {
    let source_host: String = column(row, &["Master_Host", "Source_Host"])
        .ok_or_else(|| NodeError::malformed(address, "status row without source host"))?;
    let source_port: u16 = column(row, &["Master_Port", "Source_Port"])
        .ok_or_else(|| NodeError::malformed(address, "status row without source port"))?;

    let executed: String = column(row, &["Executed_Gtid_Set"]).unwrap_or_default();
    let source_uuid: String = column(row, &["Master_UUID", "Source_UUID"]).unwrap_or_default();
    let source_uuid = match source_uuid.trim() {
        "" => None,
        text => Some(Uuid::parse_str(text).map_err(|_| {
            NodeError::malformed(address, format!("invalid source uuid '{}'", text))
        })?),
    };

    let io: String = column(row, &["Slave_IO_Running", "Replica_IO_Running"]).unwrap_or_default();
    let sql: String =
        column(row, &["Slave_SQL_Running", "Replica_SQL_Running"]).unwrap_or_default();

    Ok(StatusRow {
        channel_name: column(row, &["Channel_Name"]).unwrap_or_default(),
        auto_position: column::<i64>(row, &["Auto_Position"]).unwrap_or(0) == 1,
        executed_gtid_set: parse_set(address, &executed)?,
        source_host,
        source_port,
        source_uuid,
        io_running: ThreadState::from_status(&io),
        sql_running: ThreadState::from_status(&sql),
    })
}

fn registered_replica(address: &NodeAddress, row: &Row) -> NodeResult<RegisteredReplica> {
    let server_id: u32 = column(row, &["Server_id", "Server_Id"])
        .ok_or_else(|| NodeError::malformed(address, "replica row without server id"))?;
    let uuid: String = column(row, &["Slave_UUID", "Replica_UUID"])
        .ok_or_else(|| NodeError::malformed(address, "replica row without uuid"))?;
    let uuid = Uuid::parse_str(uuid.trim())
        .map_err(|_| NodeError::malformed(address, format!("invalid replica uuid '{}'", uuid)))?;

    Ok(RegisteredReplica {
        server_id,
        host: column(row, &["Host"]).unwrap_or_default(),
        uuid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_per_terminology() {
        let legacy = Terminology::Legacy.statements();
        assert_eq!(legacy.show_status, "SHOW SLAVE STATUS");
        assert_eq!(legacy.reset_applier, "RESET SLAVE");

        let modern = Terminology::Modern.statements();
        assert_eq!(modern.show_replicas, "SHOW REPLICAS");
        assert_eq!(modern.stop_applier, "STOP REPLICA");
        assert_eq!(modern.reset_source, "RESET MASTER");
    }

    #[test]
    fn test_terminology_defaults_to_legacy() {
        assert_eq!(Terminology::default(), Terminology::Legacy);
        let parsed: Terminology = serde_json::from_str("\"modern\"").unwrap();
        assert_eq!(parsed, Terminology::Modern);
    }

    #[test]
    fn test_set_purged_statement() {
        let set = GtidSet::parse("3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5").unwrap();
        assert_eq!(
            set_purged_statement(&set),
            "SET GLOBAL gtid_purged = '3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5'"
        );
    }
}
