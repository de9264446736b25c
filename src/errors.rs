//! Error types for the workflow engine and the analyst capability.
//!
//! `WorkflowError` aborts a run. `CapabilityError` never does: every node
//! catches it at its boundary and substitutes fallback content.

use crate::models::{NodeId, Role};
use thiserror::Error;

/// Fatal workflow errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Neither a query nor a transcript message was supplied.
    #[error("no usable query: both the query and the first transcript message are empty")]
    MissingQuery,

    /// Two concurrent updates wrote a field that has no merge rule.
    #[error("conflicting concurrent writes to `{field}`")]
    MergeConflict { field: &'static str },

    /// A completion flag was written for a role outside the analyst set.
    #[error("completion flag for `{0}` is not an analyst role")]
    UnknownCompletionKey(Role),

    /// The consensus gate could not advance the revision counter.
    #[error("revision counter overflow")]
    RevisionOverflow,

    /// The run exceeded its node execution budget.
    #[error("workflow exceeded {limit} node executions without terminating")]
    StepLimitExceeded { limit: usize },

    /// An analysis node was routed outside the concurrent fan-out.
    #[error("`{0}` only runs inside the analysis fan-out")]
    DetachedNode(NodeId),

    /// The workflow policy is unusable.
    #[error("invalid workflow policy: {0}")]
    InvalidPolicy(String),
}

/// Failure of an analyst invocation (or of a lookup it depends on).
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("cannot connect to model server at {0}")]
    Connect(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("model server error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("no final answer after {0} tool rounds")]
    ToolRoundsExhausted(usize),

    #[error("analyst unavailable: {0}")]
    Unavailable(String),
}

impl CapabilityError {
    /// Whether the failure came from the transport rather than the model's output.
    pub fn is_transport(&self) -> bool {
        matches!(self, CapabilityError::Connect(_) | CapabilityError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WorkflowError::MergeConflict {
            field: "final_report",
        };
        assert_eq!(err.to_string(), "conflicting concurrent writes to `final_report`");

        let err = CapabilityError::Api {
            status: 500,
            body: "model not loaded".to_string(),
        };
        assert_eq!(err.to_string(), "model server error 500: model not loaded");
        assert!(!err.is_transport());
        assert!(CapabilityError::Timeout(30).is_transport());
    }
}
