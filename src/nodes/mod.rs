//! Workflow nodes.
//!
//! Every node reads the current state and returns a [`NodeOutput`] whose
//! update the engine merges. Analyst failures are absorbed here and turned
//! into fallback content; only [`WorkflowError`](crate::errors::WorkflowError)
//! escapes a node.

pub mod analysis;
pub mod barrier;
pub mod consensus;
pub mod coordinator;
pub mod review;
pub mod synthesis;

use crate::state::StateUpdate;

/// Result of executing a node.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// Partial update for the engine to merge
    pub update: StateUpdate,
    /// False when fallback content replaced a failed analyst call
    pub success: bool,
    /// Brief summary for the timeline
    pub summary: String,
}

impl NodeOutput {
    pub fn success(update: StateUpdate, summary: impl Into<String>) -> Self {
        Self {
            update,
            success: true,
            summary: summary.into(),
        }
    }

    pub fn degraded(update: StateUpdate, summary: impl Into<String>) -> Self {
        Self {
            update,
            success: false,
            summary: summary.into(),
        }
    }
}
