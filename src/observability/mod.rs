//! Observability for repair runs
//!
//! - Structured JSON logging to stderr
//! - Typed lifecycle events
//! - Begin/complete scopes around each repair phase
//! - Append-only audit log of destructive statements
//!
//! Observability never changes the outcome of a repair: failed log writes are
//! ignored, failed audit writes are logged and ignored.

mod audit;
mod events;
mod logger;
mod scope;

pub use audit::{AuditLog, AuditOutcome, AuditRecord, FileAuditLog, MemoryAuditLog};
pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Append to an audit log, logging (not propagating) a failed write.
pub fn audit(log: &dyn AuditLog, record: AuditRecord) {
    if let Err(e) = log.append(&record) {
        let reason = e.to_string();
        Logger::error(
            "AUDIT_WRITE_FAILED",
            &[("statement", record.statement.as_str()), ("reason", reason.as_str())],
        );
    }
}
