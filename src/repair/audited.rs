//! Audited execution of replication control statements

use crate::errors::Stage;
use crate::gtid::GtidSet;
use crate::node::{NodeConnection, NodeResult};
use crate::observability::{audit, AuditLog, AuditOutcome, AuditRecord};

/// Run `op` against `conn`, recording it as pending and then with its outcome.
pub(crate) fn run<N, F>(
    log: &dyn AuditLog,
    stage: Stage,
    conn: &mut N,
    statement: &str,
    argument: Option<&GtidSet>,
    op: F,
) -> NodeResult<()>
where
    N: NodeConnection,
    F: FnOnce(&mut N) -> NodeResult<()>,
{
    let node = conn.address().to_string();
    let argument = argument.map(GtidSet::to_string);
    let record = |outcome| {
        let record = AuditRecord::new(stage.as_str(), node.as_str(), statement, outcome);
        match &argument {
            Some(arg) => record.with_argument(arg.as_str()),
            None => record,
        }
    };

    audit(log, record(AuditOutcome::Pending));
    let result = op(conn);
    match &result {
        Ok(()) => audit(log, record(AuditOutcome::Success)),
        Err(e) => audit(log, record(AuditOutcome::Failed).with_error(e.message.as_str())),
    }
    result
}
