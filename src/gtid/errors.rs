//! GTID parsing error types

use std::fmt;

/// GTID error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtidError {
    /// Error kind
    pub kind: GtidErrorKind,
    /// Error message
    pub message: String,
}

/// GTID error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtidErrorKind {
    /// Token has no usable source UUID
    InvalidUuid,

    /// Interval is not `n` or `a-b` with `0 < a <= b`
    InvalidInterval,

    /// Token is empty or carries no interval
    EmptyToken,
}

impl GtidError {
    /// Create a new GTID error.
    pub fn new(kind: GtidErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid UUID error.
    pub fn invalid_uuid(token: &str) -> Self {
        Self::new(
            GtidErrorKind::InvalidUuid,
            format!("invalid source uuid in gtid token '{}'", token),
        )
    }

    /// Create an invalid interval error.
    pub fn invalid_interval(interval: &str) -> Self {
        Self::new(
            GtidErrorKind::InvalidInterval,
            format!("invalid gtid interval '{}'", interval),
        )
    }

    /// Create an empty token error.
    pub fn empty_token(token: &str) -> Self {
        Self::new(
            GtidErrorKind::EmptyToken,
            format!("empty gtid token '{}'", token),
        )
    }
}

impl fmt::Display for GtidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GtidError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for GtidError {}

/// Result type for GTID operations
pub type GtidResult<T> = Result<T, GtidError>;
