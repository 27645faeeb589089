//! In-memory replication cluster for integration tests
//!
//! Implements `Connector` / `NodeConnection` on top of the crate's own GTID
//! algebra. Every call is recorded per node, connections are counted as they
//! open and close, and any operation on any node can be made to fail.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use gtid_errant_fixer::gtid::GtidSet;
use gtid_errant_fixer::node::{
    Connector, Credentials, NodeAddress, NodeConnection, NodeError, NodeResult, RegisteredReplica,
    ServerIdentity, StatusRow, ThreadState,
};
use uuid::Uuid;

/// Deterministic server UUID for node `n`.
pub fn uuid(n: u8) -> Uuid {
    Uuid::from_bytes([n; 16])
}

/// `<uuid(n)>:<intervals>`
pub fn gtid(n: u8, intervals: &str) -> String {
    format!("{}:{}", uuid(n), intervals)
}

pub fn set(text: &str) -> GtidSet {
    GtidSet::parse(text).unwrap()
}

pub fn addr(n: u8) -> NodeAddress {
    NodeAddress::new(format!("db{}", n), 3306)
}

pub fn admin() -> Credentials {
    Credentials::new("admin", "admin-pw")
}

pub fn monitor() -> Credentials {
    Credentials::new("monitor", "monitor-pw")
}

/// Calls a fake node answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Connect,
    ReadStatus,
    ReadReplicas,
    ReadExecuted,
    ReadIdentity,
    Subtract,
    Stop,
    Start,
    ResetApplier,
    ResetSource,
    SetPurged,
}

impl Op {
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Op::Stop | Op::Start | Op::ResetApplier | Op::ResetSource | Op::SetPurged
        )
    }
}

#[derive(Debug, Clone)]
struct Channel {
    name: String,
    source: NodeAddress,
    source_uuid: Option<Uuid>,
    auto_position: bool,
}

#[derive(Debug, Clone)]
struct FakeNode {
    uuid: Uuid,
    reported_uuid: Uuid,
    server_id: u32,
    report_host: Option<String>,
    executed: GtidSet,
    channels: Vec<Channel>,
    registered: Vec<RegisteredReplica>,
    applier_running: bool,
    /// Executed set the node reaches by the time its applier stops.
    executed_on_stop: Option<GtidSet>,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<NodeAddress, FakeNode>,
    calls: Vec<(NodeAddress, Op)>,
    /// Remaining successful calls before the operation starts failing.
    failures: HashMap<(NodeAddress, Op), usize>,
    credentials: Vec<(NodeAddress, Credentials)>,
    opened: usize,
    closed: usize,
}

impl State {
    /// Record a call and decide whether it fails.
    fn call(&mut self, address: &NodeAddress, op: Op) -> NodeResult<()> {
        self.calls.push((address.clone(), op));
        match self.failures.get_mut(&(address.clone(), op)) {
            Some(0) => Err(match op {
                Op::Connect => NodeError::connection(address, "connection refused"),
                _ => NodeError::query(address, &format!("{:?}", op), "injected failure"),
            }),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn node(&mut self, address: &NodeAddress) -> NodeResult<&mut FakeNode> {
        self.nodes
            .get_mut(address)
            .ok_or_else(|| NodeError::connection(address, "unknown host"))
    }
}

/// A set of fake MySQL servers.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Rc<RefCell<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add server `n` at `db<n>:3306` with the given executed set.
    pub fn server(&self, n: u8, executed: &str) -> NodeAddress {
        let address = addr(n);
        self.state.borrow_mut().nodes.insert(
            address.clone(),
            FakeNode {
                uuid: uuid(n),
                reported_uuid: uuid(n),
                server_id: n as u32 * 100,
                report_host: Some(format!("db{}.example", n)),
                executed: set(executed),
                channels: Vec::new(),
                registered: Vec::new(),
                applier_running: true,
                executed_on_stop: None,
            },
        );
        address
    }

    /// `replica` pulls from `source` over `channel`.
    pub fn replicate(&self, replica: u8, source: u8, channel: &str, auto_position: bool) {
        let mut state = self.state.borrow_mut();
        let source_uuid = state.nodes[&addr(source)].uuid;
        let replica_node = state.nodes.get_mut(&addr(replica)).unwrap();
        replica_node.channels.push(Channel {
            name: channel.to_string(),
            source: addr(source),
            source_uuid: Some(source_uuid),
            auto_position,
        });
        let registration = RegisteredReplica {
            server_id: replica_node.server_id,
            host: format!("db{}.registered", replica),
            uuid: replica_node.uuid,
        };
        state
            .nodes
            .get_mut(&addr(source))
            .unwrap()
            .registered
            .push(registration);
    }

    /// Blank the source UUID of every channel on `replica`.
    pub fn forget_source_uuid(&self, replica: u8) {
        let mut state = self.state.borrow_mut();
        for channel in &mut state.nodes.get_mut(&addr(replica)).unwrap().channels {
            channel.source_uuid = None;
        }
    }

    /// Make server `n` report a different UUID about itself.
    pub fn misreport_uuid(&self, n: u8, reported: Uuid) {
        self.state
            .borrow_mut()
            .nodes
            .get_mut(&addr(n))
            .unwrap()
            .reported_uuid = reported;
    }

    /// Leave `@@report_host` unset on server `n`.
    pub fn hide_report_host(&self, n: u8) {
        self.state
            .borrow_mut()
            .nodes
            .get_mut(&addr(n))
            .unwrap()
            .report_host = None;
    }

    /// Let server `n` finish applying up to `executed` when its applier stops.
    pub fn advance_on_stop(&self, n: u8, executed: &str) {
        self.state
            .borrow_mut()
            .nodes
            .get_mut(&addr(n))
            .unwrap()
            .executed_on_stop = Some(set(executed));
    }

    pub fn set_executed(&self, n: u8, executed: &str) {
        self.state
            .borrow_mut()
            .nodes
            .get_mut(&addr(n))
            .unwrap()
            .executed = set(executed);
    }

    /// Fail every `op` on server `n`.
    pub fn fail(&self, n: u8, op: Op) {
        self.fail_after(n, op, 0);
    }

    /// Let `succeed` calls of `op` on server `n` through, then fail.
    pub fn fail_after(&self, n: u8, op: Op, succeed: usize) {
        self.state
            .borrow_mut()
            .failures
            .insert((addr(n), op), succeed);
    }

    /// Open the root connection the way the CLI does.
    pub fn open(&self, n: u8) -> FakeConnection {
        self.connect(&addr(n), &admin()).unwrap()
    }

    /// All calls made against server `n`, in order.
    pub fn calls(&self, n: u8) -> Vec<Op> {
        let address = addr(n);
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, op)| *op)
            .collect()
    }

    /// Replication control statements issued against server `n`, in order.
    pub fn destructive_calls(&self, n: u8) -> Vec<Op> {
        self.calls(n)
            .into_iter()
            .filter(Op::is_destructive)
            .collect()
    }

    pub fn count(&self, n: u8, op: Op) -> usize {
        self.calls(n).into_iter().filter(|o| *o == op).count()
    }

    pub fn executed(&self, n: u8) -> GtidSet {
        self.state.borrow().nodes[&addr(n)].executed.clone()
    }

    pub fn applier_running(&self, n: u8) -> bool {
        self.state.borrow().nodes[&addr(n)].applier_running
    }

    /// Credentials used for every connection to server `n`.
    pub fn logins(&self, n: u8) -> Vec<Credentials> {
        let address = addr(n);
        self.state
            .borrow()
            .credentials
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }
}

impl Connector for FakeCluster {
    type Connection = FakeConnection;

    fn connect(
        &self,
        address: &NodeAddress,
        credentials: &Credentials,
    ) -> NodeResult<FakeConnection> {
        let mut state = self.state.borrow_mut();
        state.call(address, Op::Connect)?;
        state.node(address)?;
        state
            .credentials
            .push((address.clone(), credentials.clone()));
        state.opened += 1;
        Ok(FakeConnection {
            address: address.clone(),
            state: Rc::clone(&self.state),
        })
    }
}

/// A session on one fake server.
pub struct FakeConnection {
    address: NodeAddress,
    state: Rc<RefCell<State>>,
}

impl FakeConnection {
    fn with<T>(
        &mut self,
        op: Op,
        f: impl FnOnce(&mut FakeNode) -> NodeResult<T>,
    ) -> NodeResult<T> {
        let mut state = self.state.borrow_mut();
        state.call(&self.address, op)?;
        let node = state.node(&self.address)?;
        f(node)
    }
}

impl NodeConnection for FakeConnection {
    fn address(&self) -> &NodeAddress {
        &self.address
    }

    fn read_own_status(&mut self) -> NodeResult<Vec<StatusRow>> {
        self.with(Op::ReadStatus, |node| {
            let state = if node.applier_running {
                ThreadState::Running
            } else {
                ThreadState::Stopped
            };
            Ok(node
                .channels
                .iter()
                .map(|c| StatusRow {
                    channel_name: c.name.clone(),
                    auto_position: c.auto_position,
                    executed_gtid_set: node.executed.clone(),
                    source_host: c.source.host.clone(),
                    source_port: c.source.port,
                    source_uuid: c.source_uuid,
                    io_running: state,
                    sql_running: state,
                })
                .collect())
        })
    }

    fn read_registered_replicas(&mut self) -> NodeResult<Vec<RegisteredReplica>> {
        self.with(Op::ReadReplicas, |node| Ok(node.registered.clone()))
    }

    fn read_global_executed_set(&mut self) -> NodeResult<GtidSet> {
        self.with(Op::ReadExecuted, |node| Ok(node.executed.clone()))
    }

    fn read_server_identity(&mut self) -> NodeResult<ServerIdentity> {
        self.with(Op::ReadIdentity, |node| {
            Ok(ServerIdentity {
                report_host: node.report_host.clone(),
                server_id: node.server_id,
                server_uuid: node.reported_uuid,
            })
        })
    }

    fn set_subtract(&mut self, a: &GtidSet, b: &GtidSet) -> NodeResult<GtidSet> {
        self.with(Op::Subtract, |_| Ok(a.subtract(b)))
    }

    fn stop_applier(&mut self) -> NodeResult<()> {
        self.with(Op::Stop, |node| {
            node.applier_running = false;
            if let Some(executed) = node.executed_on_stop.take() {
                node.executed = executed;
            }
            Ok(())
        })
    }

    fn start_applier(&mut self) -> NodeResult<()> {
        self.with(Op::Start, |node| {
            node.applier_running = true;
            Ok(())
        })
    }

    fn reset_applier(&mut self) -> NodeResult<()> {
        self.with(Op::ResetApplier, |_| Ok(()))
    }

    fn reset_source(&mut self) -> NodeResult<()> {
        self.with(Op::ResetSource, |node| {
            node.executed = GtidSet::empty();
            Ok(())
        })
    }

    fn set_purged(&mut self, purged: &GtidSet) -> NodeResult<()> {
        let address = self.address.clone();
        self.with(Op::SetPurged, |node| {
            if !node.executed.is_empty() {
                return Err(NodeError::query(
                    &address,
                    "SET GLOBAL gtid_purged",
                    "GTID_PURGED can only be set when GTID_EXECUTED is empty",
                ));
            }
            node.executed = purged.clone();
            Ok(())
        })
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.state.borrow_mut().closed += 1;
    }
}
