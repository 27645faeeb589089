//! Recursive topology discovery
//!
//! Starting at the root, each visited node's status rows name its sources.
//! Every new source becomes a child one level further out, is connected to
//! with the operator's credentials, and is visited in turn. A UUID reached a
//! second time is skipped, so cycles and diamonds terminate.
//!
//! Each child connection is scoped to its visit and closed on every exit
//! path, including early returns on error.

use uuid::Uuid;

use crate::errors::{FixerError, FixerResult, Stage};
use crate::node::{Connector, Credentials, NodeConnection, NodeError};
use crate::observability::{log_event_with_fields, Event, Logger};

use super::model::{Node, Topology, TopologyBuilder};

/// Walks a replication topology from one node outward.
pub struct TopologyWalker<'a, C: Connector> {
    connector: &'a C,
    credentials: &'a Credentials,
}

impl<'a, C: Connector> TopologyWalker<'a, C> {
    pub fn new(connector: &'a C, credentials: &'a Credentials) -> Self {
        Self {
            connector,
            credentials,
        }
    }

    /// Build a fresh snapshot rooted at `root`.
    ///
    /// Errors are tagged [`Stage::Discover`]; callers re-tag them when
    /// discovering again after STOP.
    pub fn discover<N: NodeConnection>(&self, root: &mut N) -> FixerResult<Topology> {
        let identity = root.read_server_identity().map_err(discover_error)?;
        let address = root.address().clone();
        let uuid = identity.server_uuid;

        log_event_with_fields(
            Event::NodeDiscovered,
            &[
                ("node", address.to_string().as_str()),
                ("uuid", uuid.to_string().as_str()),
                ("level", "0"),
            ],
        );

        let mut builder = TopologyBuilder::new(Node::root(&identity, address));
        self.visit(root, uuid, 0, &mut builder)?;
        Ok(builder.build())
    }

    fn visit<N: NodeConnection>(
        &self,
        conn: &mut N,
        uuid: Uuid,
        level: u32,
        builder: &mut TopologyBuilder,
    ) -> FixerResult<()> {
        let rows = conn.read_own_status().map_err(discover_error)?;

        if rows.is_empty() {
            let executed = conn.read_global_executed_set().map_err(discover_error)?;
            builder.set_executed(&uuid, executed);
            builder.mark_top(&uuid);
            log_event_with_fields(
                Event::TopologyTopFound,
                &[("node", conn.address().to_string().as_str())],
            );
            return Ok(());
        }

        // Every row carries the node's own executed set; they agree.
        builder.set_executed(&uuid, rows[0].executed_gtid_set.clone());

        let mut discovered = Vec::new();
        for row in &rows {
            let source = row.source_uuid.ok_or_else(|| {
                discover_error(NodeError::malformed(
                    conn.address(),
                    format!(
                        "channel '{}' to {} reports no source uuid",
                        row.channel_name,
                        row.source_address()
                    ),
                ))
            })?;

            if builder.register(Node::from_status(source, row, level + 1, uuid)) {
                discovered.push(source);
            } else {
                log_event_with_fields(
                    Event::TopologyDuplicateSkipped,
                    &[
                        ("uuid", source.to_string().as_str()),
                        ("via", conn.address().to_string().as_str()),
                    ],
                );
            }
        }

        for replica in conn.read_registered_replicas().map_err(discover_error)? {
            if !builder.merge_registered(&replica.uuid, replica.server_id, &replica.host) {
                Logger::trace(
                    "REGISTERED_REPLICA_OUTSIDE_TOPOLOGY",
                    &[("uuid", replica.uuid.to_string().as_str())],
                );
            }
        }

        for child in discovered {
            let address = match builder.get(&child) {
                Some(node) => node.address.clone(),
                None => continue,
            };

            let mut child_conn = self
                .connector
                .connect(&address, self.credentials)
                .map_err(discover_error)?;

            let identity = child_conn.read_server_identity().map_err(discover_error)?;
            if identity.server_uuid != child {
                return Err(discover_error(NodeError::malformed(
                    &address,
                    format!(
                        "announced as {} but reports server_uuid {}",
                        child, identity.server_uuid
                    ),
                )));
            }
            builder.apply_identity(&identity);

            log_event_with_fields(
                Event::NodeDiscovered,
                &[
                    ("node", address.to_string().as_str()),
                    ("uuid", child.to_string().as_str()),
                    ("level", (level + 1).to_string().as_str()),
                ],
            );

            self.visit(&mut child_conn, child, level + 1, builder)?;
        }

        Ok(())
    }
}

fn discover_error(err: NodeError) -> FixerError {
    FixerError::from_node(Stage::Discover, err)
}
