//! Errant set calculation and the resume guard

mod common;

use common::{gtid, monitor, set, uuid, FakeCluster, Op};
use gtid_errant_fixer::observability::{AuditOutcome, MemoryAuditLog};
use gtid_errant_fixer::repair::{ErrantSetCalculator, ResumeGuard};
use gtid_errant_fixer::topology::{Topology, TopologyWalker};

fn two_node_cluster(root: &str, source: &str) -> FakeCluster {
    let cluster = FakeCluster::new();
    cluster.server(1, root);
    cluster.server(2, source);
    cluster.replicate(1, 2, "", true);
    cluster
}

fn discover(cluster: &FakeCluster) -> Topology {
    let mut root = cluster.open(1);
    let creds = monitor();
    TopologyWalker::new(cluster, &creds)
        .discover(&mut root)
        .unwrap()
}

// =============================================================================
// COMPUTE
// =============================================================================

#[test]
fn test_union_of_upstream_sets_is_subtracted() {
    let cluster = two_node_cluster("", "");
    let topology = discover(&cluster);
    let mut root = cluster.open(1);

    let subject = set(&format!("{},{},{}", gtid(2, "1-10"), gtid(3, "1-5"), gtid(4, "1-2")));
    let upstream = vec![set(&gtid(2, "1-10")), set(&gtid(3, "1-5"))];

    let report = ErrantSetCalculator::compute(&mut root, &subject, &upstream, &topology).unwrap();

    assert_eq!(report.as_set().to_string(), gtid(4, "1-2"));
    assert_eq!(report.sources(), vec![uuid(4)]);
    assert_eq!(cluster.count(1, Op::Subtract), 1);
}

#[test]
fn test_subset_is_clean() {
    let cluster = two_node_cluster("", "");
    let topology = discover(&cluster);
    let mut root = cluster.open(1);

    let subject = set(&format!("{},{}", gtid(2, "3-7"), gtid(3, "1")));
    let upstream = vec![set(&gtid(2, "1-10")), set(&gtid(3, "1-5"))];

    let report = ErrantSetCalculator::compute(&mut root, &subject, &upstream, &topology).unwrap();
    assert!(report.is_empty());
}

#[test]
fn test_entries_annotated_from_topology() {
    let cluster = two_node_cluster("", "");
    let topology = discover(&cluster);
    let mut root = cluster.open(1);

    let subject = set(&format!("{},{}", gtid(2, "1-3"), gtid(7, "4")));
    let report = ErrantSetCalculator::compute(&mut root, &subject, &[], &topology).unwrap();

    let known = &report.entries()[0];
    assert_eq!(known.source, uuid(2));
    assert_eq!(known.server_id, Some(200));
    assert_eq!(known.host.as_deref(), Some("db2.example"));

    let unknown = &report.entries()[1];
    assert_eq!(unknown.source, uuid(7));
    assert_eq!(unknown.server_id, None);
    assert!(unknown.to_string().contains("server_id: unknown"));
}

// =============================================================================
// DETECT
// =============================================================================

#[test]
fn test_detect_reads_sources_live() {
    let cluster = two_node_cluster(
        &format!("{},{}", gtid(2, "1-5"), gtid(1, "1")),
        &gtid(2, "1-5"),
    );
    let topology = discover(&cluster);

    // db2 catches up with db1's extra transaction after the snapshot.
    cluster.set_executed(2, &format!("{},{}", gtid(2, "1-5"), gtid(1, "1")));

    let creds = monitor();
    let mut root = cluster.open(1);
    let report = ErrantSetCalculator::detect(&mut root, &cluster, &creds, &topology).unwrap();

    assert!(report.is_empty());
    assert_eq!(cluster.count(2, Op::ReadExecuted), 2);
}

#[test]
fn test_detect_finds_errant_and_closes_connections() {
    let cluster = two_node_cluster(
        &format!("{},{}", gtid(2, "1-5"), gtid(1, "1-2")),
        &gtid(2, "1-5"),
    );
    let topology = discover(&cluster);

    {
        let creds = monitor();
        let mut root = cluster.open(1);
        let report =
            ErrantSetCalculator::detect(&mut root, &cluster, &creds, &topology).unwrap();
        assert_eq!(report.as_set().to_string(), gtid(1, "1-2"));
        assert_eq!(report.entries()[0].server_id, Some(100));
    }

    assert_eq!(cluster.opened(), cluster.closed());
}

// =============================================================================
// RESUME GUARD
// =============================================================================

#[test]
fn test_guard_finish_resumes_once() {
    let cluster = two_node_cluster("", "");
    let audit = MemoryAuditLog::new();
    let mut root = cluster.open(1);

    let guard = ResumeGuard::stop(&mut root, &audit).unwrap();
    assert!(!cluster.applier_running(1));
    assert!(!guard.is_resumed());

    guard.finish(Ok(())).unwrap();

    assert_eq!(cluster.destructive_calls(1), vec![Op::Stop, Op::Start]);
    assert!(cluster.applier_running(1));
    assert_eq!(
        audit.statements(AuditOutcome::Success),
        vec!["stop-applier", "start-applier"]
    );
}

#[test]
fn test_dropped_guard_resumes() {
    let cluster = two_node_cluster("", "");
    let audit = MemoryAuditLog::new();
    let mut root = cluster.open(1);

    {
        let _guard = ResumeGuard::stop(&mut root, &audit).unwrap();
    }

    assert_eq!(cluster.destructive_calls(1), vec![Op::Stop, Op::Start]);
    assert!(cluster.applier_running(1));
}

#[test]
fn test_guard_not_acquired_when_stop_fails() {
    let cluster = two_node_cluster("", "");
    cluster.fail(1, Op::Stop);
    let audit = MemoryAuditLog::new();
    let mut root = cluster.open(1);

    assert!(ResumeGuard::stop(&mut root, &audit).is_err());
    assert_eq!(cluster.count(1, Op::Start), 0);
}
