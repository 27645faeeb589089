//! Resume-after-stop guarantee
//!
//! A [`ResumeGuard`] only exists once the applier has been stopped. From then
//! on every path out of the repair restarts it exactly once: explicitly
//! through [`ResumeGuard::finish`], or from `Drop` if the guard is abandoned
//! (for instance by a panic). The restart is never retried.

use std::ops::{Deref, DerefMut};

use crate::errors::{FixerError, FixerResult, Stage};
use crate::node::NodeConnection;
use crate::observability::{log_event_with_fields, AuditLog, Event, Logger};

use super::audited;

/// Exclusive access to a stopped root connection.
pub struct ResumeGuard<'a, N: NodeConnection> {
    conn: &'a mut N,
    audit: &'a dyn AuditLog,
    resumed: bool,
}

impl<'a, N: NodeConnection> ResumeGuard<'a, N> {
    /// Stop the applier on `conn`; the guard is returned only if that worked.
    pub fn stop(conn: &'a mut N, audit: &'a dyn AuditLog) -> FixerResult<Self> {
        audited::run(audit, Stage::Stop, conn, "stop-applier", None, |c| {
            c.stop_applier()
        })
        .map_err(|e| FixerError::from_node(Stage::Stop, e))?;

        log_event_with_fields(
            Event::ReplicationStopped,
            &[("node", conn.address().to_string().as_str())],
        );

        Ok(Self {
            conn,
            audit,
            resumed: false,
        })
    }

    /// Restart the applier and fold the outcome into `result`.
    ///
    /// A failed restart becomes [`FixerError::Resume`], carrying any error
    /// `result` already held.
    pub fn finish<T>(mut self, result: FixerResult<T>) -> FixerResult<T> {
        match self.resume() {
            Ok(()) => result,
            Err(message) => Err(FixerError::Resume {
                node: self.conn.address().clone(),
                message,
                prior: result.err().map(Box::new),
            }),
        }
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    fn resume(&mut self) -> Result<(), String> {
        self.resumed = true;

        let outcome = audited::run(
            self.audit,
            Stage::Resume,
            &mut *self.conn,
            "start-applier",
            None,
            |c| c.start_applier(),
        );

        let node = self.conn.address().to_string();
        match outcome {
            Ok(()) => {
                log_event_with_fields(Event::ReplicationResumed, &[("node", node.as_str())]);
                Ok(())
            }
            Err(e) => {
                log_event_with_fields(
                    Event::ResumeFailed,
                    &[("node", node.as_str()), ("reason", e.message.as_str())],
                );
                Err(e.message)
            }
        }
    }
}

impl<N: NodeConnection> Deref for ResumeGuard<'_, N> {
    type Target = N;

    fn deref(&self) -> &N {
        &*self.conn
    }
}

impl<N: NodeConnection> DerefMut for ResumeGuard<'_, N> {
    fn deref_mut(&mut self) -> &mut N {
        &mut *self.conn
    }
}

impl<N: NodeConnection> Drop for ResumeGuard<'_, N> {
    fn drop(&mut self) {
        if !self.resumed {
            Logger::warn(
                "RESUME_GUARD_DROPPED",
                &[("node", self.conn.address().to_string().as_str())],
            );
            // Errors cannot leave drop; `resume` has already logged them.
            let _ = self.resume();
        }
    }
}
