/// Error taxonomy for question-answering runs
///
/// Protocol and infrastructure failures abort a run. Query-level failures are
/// folded into the conversation by the tool registry and only show up here when
/// the database itself is unreachable.

use crate::workflow::graph::GraphError;
use serde::Serialize;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Failure talking to the reasoning service, or a reply that breaks its contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningProtocolError {
    #[error("reasoning service unreachable: {0}")]
    Unreachable(String),

    #[error("reasoning service timed out after {0:?}")]
    Timeout(Duration),

    #[error("reasoning service answered with HTTP status {status}")]
    Status { status: u16 },

    #[error("malformed reasoning reply: {0}")]
    Malformed(String),

    #[error("step '{step}' requires a tool call but the reply carried none")]
    MissingToolCall { step: String },

    #[error("reply called capability '{name}' which was not offered")]
    UnexpectedCapability { name: String },
}

/// Classification of a failed tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Statement would mutate the database; rejected before execution
    Forbidden,
    /// Statement reached the database and failed (syntax, types, timeout)
    ExecutionFailed,
    /// The database could not be reached at all
    Unavailable,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden => write!(f, "forbidden"),
            Self::ExecutionFailed => write!(f, "execution failed"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Structured tool failure, serialized into the message log as a tool-role error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct ToolExecutionError {
    pub kind: ToolErrorKind,
    pub detail: String,
}

impl ToolExecutionError {
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self { kind: ToolErrorKind::Forbidden, detail: detail.into() }
    }

    pub fn execution_failed(detail: impl Into<String>) -> Self {
        Self { kind: ToolErrorKind::ExecutionFailed, detail: detail.into() }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self { kind: ToolErrorKind::Unavailable, detail: detail.into() }
    }

    /// Whether the conversation can absorb this failure and try again
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind, ToolErrorKind::Unavailable)
    }
}

/// A tool call could not be built from the supplied name and arguments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("{capability} requires a non-empty '{argument}' argument")]
    MissingArgument { capability: &'static str, argument: &'static str },

    #[error("{capability} argument '{argument}' is invalid: {reason}")]
    InvalidArgument { capability: &'static str, argument: &'static str, reason: String },
}

/// Violation of the message log's answer-correlation invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("tool message carries no call id")]
    MissingCallId,

    #[error("tool message answers '{0}' which was never emitted or is already answered")]
    OrphanedResult(String),

    #[error("tool message answers '{got}' but '{expected}' was emitted first")]
    OutOfOrder { expected: String, got: String },

    #[error("call id '{0}' was already answered and cannot be emitted again")]
    ReusedCallId(String),
}

/// Why a run was abandoned
#[derive(Debug, Error)]
pub enum FailureKind {
    #[error("reasoning service failure: {0}")]
    Reasoning(#[from] ReasoningProtocolError),

    #[error("query loop did not settle on an answer within {limit} generation steps")]
    IterationLimitExceeded { limit: u32 },

    #[error("database unavailable: {0}")]
    ToolUnavailable(ToolExecutionError),

    #[error("run cancelled")]
    Cancelled,

    #[error("message log rejected a step's output: {0}")]
    Log(#[from] LogError),

    #[error("workflow graph error: {0}")]
    Graph(#[from] GraphError),
}

impl FailureKind {
    /// Stable identifier for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Reasoning(_) => "reasoning_protocol",
            Self::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            Self::ToolUnavailable(_) => "database_unavailable",
            Self::Cancelled => "cancelled",
            Self::Log(_) => "log_invariant",
            Self::Graph(_) => "workflow_graph",
        }
    }
}

/// Typed failure of one orchestration run
///
/// Carries the last query the run attempted so callers can log and display the
/// failure without access to the raw conversation.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct OrchestrationError {
    #[source]
    pub kind: FailureKind,
    pub last_query: Option<String>,
}

impl OrchestrationError {
    pub fn new(kind: impl Into<FailureKind>, last_query: Option<String>) -> Self {
        Self { kind: kind.into(), last_query }
    }
}
