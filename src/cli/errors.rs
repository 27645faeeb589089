//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 1.

use std::fmt;
use std::io;

use crate::errors::FixerError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file missing or invalid
    ConfigError,
    /// I/O error (stdin/stdout, audit file)
    IoError,
    /// The repair itself failed
    RepairFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "GTID_FIX_CLI_CONFIG_ERROR",
            Self::IoError => "GTID_FIX_CLI_IO_ERROR",
            Self::RepairFailed => "GTID_FIX_CLI_REPAIR_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::config_error(format!("JSON error: {}", e))
    }
}

impl From<FixerError> for CliError {
    fn from(e: FixerError) -> Self {
        let mut message = format!("{}: {}", e.code(), e);
        if e.requires_manual_remediation() {
            message.push_str("; check replication on the node before retrying");
        }
        Self::new(CliErrorCode::RepairFailed, message)
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApplyStep;
    use crate::node::NodeAddress;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::config_error("user must not be empty");
        assert_eq!(
            err.to_string(),
            "GTID_FIX_CLI_CONFIG_ERROR: user must not be empty"
        );
    }

    #[test]
    fn test_from_fixer_error() {
        let err: CliError = FixerError::Apply {
            step: ApplyStep::SetPurged,
            node: NodeAddress::new("db1", 3306),
            message: "denied".into(),
        }
        .into();
        assert_eq!(err.code(), &CliErrorCode::RepairFailed);
        assert!(err.message().starts_with("GTID_FIX_APPLY"));
        assert!(err.message().contains("set-purged"));
        assert!(err.message().contains("check replication"));
    }
}
