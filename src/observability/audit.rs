//! Audit log of destructive statements
//!
//! - Every destructive statement is recorded before it runs and again with
//!   its outcome
//! - Append-only, one JSON record per line
//! - File writes are flushed and synced before `append` returns

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Audit record outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    /// About to execute.
    Pending,

    /// Statement succeeded.
    Success,

    /// Statement failed.
    Failed,
}

impl AuditOutcome {
    /// Returns the outcome string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Pending => "PENDING",
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// Unique record ID.
    pub id: Uuid,

    /// When the record was written.
    pub timestamp: DateTime<Utc>,

    /// Repair stage issuing the statement.
    pub stage: String,

    /// `host:port` of the node.
    pub node: String,

    /// Statement name (`stop-applier`, `set-purged`, ...).
    pub statement: String,

    /// Statement argument, e.g. the purge set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,

    /// Outcome of the statement.
    pub outcome: AuditOutcome,

    /// Error message when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Create a new audit record.
    pub fn new(
        stage: impl Into<String>,
        node: impl Into<String>,
        statement: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            stage: stage.into(),
            node: node.into(),
            statement: statement.into(),
            argument: None,
            outcome,
            error: None,
        }
    }

    /// Set the statement argument.
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }

    /// Set error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Serialize to a JSON line.
    pub fn to_json(&self) -> io::Result<String> {
        serde_json::to_string(self).map_err(io::Error::from)
    }
}

/// Audit log trait.
///
/// The record MUST be visible after `append` returns.
pub trait AuditLog: Send + Sync {
    /// Append a record to the audit log.
    fn append(&self, record: &AuditRecord) -> io::Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// File-based audit log implementation.
pub struct FileAuditLog {
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditLog {
    /// Open or create an audit log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record.to_json()?;
        let mut writer = lock(&self.writer);
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit log, used when no audit file is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    /// Create a new in-memory audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded entries.
    pub fn records(&self) -> Vec<AuditRecord> {
        lock(&self.records).clone()
    }

    /// Statement names of records with the given outcome, in order.
    pub fn statements(&self, outcome: AuditOutcome) -> Vec<String> {
        lock(&self.records)
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.statement.clone())
            .collect()
    }

    /// Get the number of records.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_audit_record_creation() {
        let record = AuditRecord::new("APPLY", "db1:3306", "set-purged", AuditOutcome::Pending)
            .with_argument("3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5");

        assert_eq!(record.outcome, AuditOutcome::Pending);
        assert_eq!(record.statement, "set-purged");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_audit_record_json() {
        let record = AuditRecord::new("APPLY", "db1:3306", "reset-source", AuditOutcome::Failed)
            .with_error("Access denied");

        let json = record.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["outcome"], "FAILED");
        assert_eq!(parsed["statement"], "reset-source");
        assert_eq!(parsed["error"], "Access denied");
        assert!(parsed.get("argument").is_none());
    }

    #[test]
    fn test_memory_audit_log() {
        let log = MemoryAuditLog::new();
        log.append(&AuditRecord::new("STOP", "db1:3306", "stop-applier", AuditOutcome::Pending))
            .unwrap();
        log.append(&AuditRecord::new("STOP", "db1:3306", "stop-applier", AuditOutcome::Success))
            .unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.statements(AuditOutcome::Success), vec!["stop-applier"]);
    }

    #[test]
    fn test_file_audit_log_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = FileAuditLog::open(&path).unwrap();
        log.append(&AuditRecord::new("APPLY", "db1:3306", "reset-applier", AuditOutcome::Success))
            .unwrap();
        log.append(&AuditRecord::new("RESUME", "db1:3306", "start-applier", AuditOutcome::Success))
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("reset-applier"));
        assert!(lines[1].contains("start-applier"));

        // Reopening appends instead of truncating.
        let log = FileAuditLog::open(&path).unwrap();
        log.append(&AuditRecord::new("STOP", "db1:3306", "stop-applier", AuditOutcome::Pending))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }
}
