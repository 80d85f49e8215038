//! Error taxonomy for the query engine.
//!
//! Planning-phase errors (analysis, optimization) are returned synchronously
//! to the caller. Execution-phase errors are delivered through the response
//! listener's `on_failure` and never thrown across the async boundary.

use thiserror::Error;

/// Top-level query failure.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unresolvable reference/function or a type mismatch found during
    /// analysis. Always fatal to the query, never retried.
    #[error("semantic check failed: {0}")]
    Semantic(String),

    /// Invariant violation during expression evaluation (e.g. comparing a
    /// NULL value). Indicates a bug upstream of evaluation, not user error.
    #[error("expression evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Resource limit hit during execution.
    #[error("resource exhausted (retryable={retryable}): {reason}")]
    ResourceExhausted { reason: String, retryable: bool },

    /// Opaque failure from the storage collaborator, wrapped with whatever
    /// detail the backend provided.
    #[error("storage backend error: {0}")]
    Storage(#[source] anyhow::Error),

    /// Plan shape the current engine cannot execute.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl QueryError {
    pub fn semantic(msg: impl Into<String>) -> Self {
        QueryError::Semantic(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        QueryError::Unsupported(msg.into())
    }

    /// Fast-fail resource error: the query dies immediately.
    pub fn resource_fatal(reason: impl Into<String>) -> Self {
        QueryError::ResourceExhausted {
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Transient resource error: retried a bounded number of times with
    /// backoff before failing the query.
    pub fn resource_transient(reason: impl Into<String>) -> Self {
        QueryError::ResourceExhausted {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueryError::ResourceExhausted {
                retryable: true,
                ..
            }
        )
    }
}

/// Errors raised while evaluating a typed expression tree.
///
/// Type-safe trees produced by the analyzer never hit these paths; raising
/// one signals an upstream bug rather than a user mistake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("cannot compare {0} with {1}")]
    IncomparableValues(String, String),

    #[error("invalid operand to {operator}: {detail}")]
    InvalidOperand { operator: String, detail: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression is not serializable: {0}")]
    NotSerializable(String),

    #[error("{0}")]
    Other(String),
}

impl EvaluationError {
    pub fn other(msg: impl Into<String>) -> Self {
        EvaluationError::Other(msg.into())
    }
}

/// Result alias for planning and execution paths.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result alias for expression evaluation.
pub type EvalResult<T> = Result<T, EvaluationError>;
