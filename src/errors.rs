//! Repair error taxonomy
//!
//! Every failure aborts the remaining stages. Errors carry the stage that was
//! running and, where one exists, the node that misbehaved. Nothing is retried.

use std::fmt;

use thiserror::Error;

use crate::node::{NodeAddress, NodeError, NodeErrorKind};

/// Result type for repair operations
pub type FixerResult<T> = Result<T, FixerError>;

/// Stage of a repair run, used to locate an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    Validate,
    Detect,
    Stop,
    Rediscover,
    Plan,
    Confirm,
    Apply,
    Resume,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discover => "DISCOVER",
            Stage::Validate => "VALIDATE",
            Stage::Detect => "DETECT",
            Stage::Stop => "STOP",
            Stage::Rediscover => "RE_DISCOVER",
            Stage::Plan => "PLAN",
            Stage::Confirm => "CONFIRM",
            Stage::Apply => "APPLY",
            Stage::Resume => "RESUME",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three destructive statements of APPLY, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    ResetApplier,
    ResetSource,
    SetPurged,
}

impl ApplyStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStep::ResetApplier => "reset-applier",
            ApplyStep::ResetSource => "reset-source",
            ApplyStep::SetPurged => "set-purged",
        }
    }
}

impl fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal repair errors.
#[derive(Debug, Error)]
pub enum FixerError {
    /// Node unreachable.
    #[error("[{stage}] cannot reach {node}: {message}")]
    Connection {
        stage: Stage,
        node: NodeAddress,
        message: String,
    },

    /// Statement rejected or reply not understood.
    #[error("[{stage}] query failed on {node}: {message}")]
    Query {
        stage: Stage,
        node: NodeAddress,
        message: String,
    },

    /// Auto-position is not enabled on every channel that would be reset.
    #[error("[VALIDATE] auto position must be enabled for all the channels; violating: {}", .violations.join(", "))]
    Precondition { violations: Vec<String> },

    /// A destructive APPLY statement failed. The node may be reset but not
    /// purged.
    #[error("[APPLY] {step} failed on {node}: {message}; manual remediation required")]
    Apply {
        step: ApplyStep,
        node: NodeAddress,
        message: String,
    },

    /// START of the applier failed; replication is left stopped.
    #[error("[RESUME] replication left stopped on {node}: {message}{}", prior_suffix(.prior))]
    Resume {
        node: NodeAddress,
        message: String,
        prior: Option<Box<FixerError>>,
    },

    /// Internal phase machine misuse.
    #[error("forbidden phase transition: {from} -> {to}")]
    Phase { from: &'static str, to: &'static str },
}

fn prior_suffix(prior: &Option<Box<FixerError>>) -> String {
    match prior {
        Some(err) => format!(" (after: {})", err),
        None => String::new(),
    }
}

impl FixerError {
    /// Lift a boundary error, tagging it with the running stage.
    pub fn from_node(stage: Stage, err: NodeError) -> Self {
        match err.kind {
            NodeErrorKind::Connection => FixerError::Connection {
                stage,
                node: err.address,
                message: err.message,
            },
            NodeErrorKind::Query => FixerError::Query {
                stage,
                node: err.address,
                message: err.message,
            },
        }
    }

    /// Re-tag a node error raised by a shared component (the walker, the
    /// calculator) with the stage that invoked it.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            FixerError::Connection { node, message, .. } => FixerError::Connection {
                stage,
                node,
                message,
            },
            FixerError::Query { node, message, .. } => FixerError::Query {
                stage,
                node,
                message,
            },
            other => other,
        }
    }

    /// Stage the error was raised in.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FixerError::Connection { stage, .. } | FixerError::Query { stage, .. } => Some(*stage),
            FixerError::Precondition { .. } => Some(Stage::Validate),
            FixerError::Apply { .. } => Some(Stage::Apply),
            FixerError::Resume { .. } => Some(Stage::Resume),
            FixerError::Phase { .. } => None,
        }
    }

    /// Node the error is attributed to.
    pub fn node(&self) -> Option<&NodeAddress> {
        match self {
            FixerError::Connection { node, .. }
            | FixerError::Query { node, .. }
            | FixerError::Apply { node, .. }
            | FixerError::Resume { node, .. } => Some(node),
            FixerError::Precondition { .. } | FixerError::Phase { .. } => None,
        }
    }

    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            FixerError::Connection { .. } => "GTID_FIX_CONNECTION",
            FixerError::Query { .. } => "GTID_FIX_QUERY",
            FixerError::Precondition { .. } => "GTID_FIX_PRECONDITION",
            FixerError::Apply { .. } => "GTID_FIX_APPLY",
            FixerError::Resume { .. } => "GTID_FIX_RESUME",
            FixerError::Phase { .. } => "GTID_FIX_PHASE",
        }
    }

    /// True when replication state on the node may need an operator.
    pub fn requires_manual_remediation(&self) -> bool {
        matches!(self, FixerError::Apply { .. } | FixerError::Resume { .. })
    }
}
