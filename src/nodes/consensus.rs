//! Consensus gate.
//!
//! Decides whether the synthesized report is good enough to stop, or
//! whether another review and synthesis round is due.

use crate::errors::WorkflowError;
use crate::models::Stage;
use crate::nodes::NodeOutput;
use crate::state::{StateUpdate, WorkflowState};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Thresholds for the consensus gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    /// Revision rounds allowed before the gate forces termination
    pub max_revisions: u32,
    /// Report length, in characters, that must be exceeded to pass
    pub quality_threshold: usize,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            max_revisions: 2,
            quality_threshold: 500,
        }
    }
}

/// Why the gate decided what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusReason {
    RevisionLimit,
    QualityMet,
    NeedsRevision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusDecision {
    pub consensus_reached: bool,
    pub revision_count: u32,
    pub reason: ConsensusReason,
}

/// Pure consensus decision.
pub fn evaluate_consensus(
    revision_count: u32,
    final_report: Option<&str>,
    policy: &ConsensusPolicy,
) -> Result<ConsensusDecision, WorkflowError> {
    if revision_count >= policy.max_revisions {
        return Ok(ConsensusDecision {
            consensus_reached: true,
            revision_count,
            reason: ConsensusReason::RevisionLimit,
        });
    }

    let length = final_report.map(|r| r.chars().count()).unwrap_or(0);
    if length > policy.quality_threshold {
        return Ok(ConsensusDecision {
            consensus_reached: true,
            revision_count,
            reason: ConsensusReason::QualityMet,
        });
    }

    let next = revision_count
        .checked_add(1)
        .ok_or(WorkflowError::RevisionOverflow)?;
    Ok(ConsensusDecision {
        consensus_reached: false,
        revision_count: next,
        reason: ConsensusReason::NeedsRevision,
    })
}

/// Node wrapper: writes the decision and the stage.
pub fn check_consensus(
    state: &WorkflowState,
    policy: &ConsensusPolicy,
) -> Result<NodeOutput, WorkflowError> {
    let decision = evaluate_consensus(state.revision_count, state.final_report.as_deref(), policy)?;

    let summary = match decision.reason {
        ConsensusReason::RevisionLimit => {
            format!("revision limit {} reached", policy.max_revisions)
        }
        ConsensusReason::QualityMet => "report meets the quality threshold".to_string(),
        ConsensusReason::NeedsRevision => {
            format!("revision {} requested", decision.revision_count)
        }
    };
    info!("🔍 Consensus check: {}", summary);

    let update = StateUpdate::new()
        .consensus(decision.consensus_reached)
        .revision_count(decision.revision_count)
        .stage(Stage::ConsensusChecked);

    Ok(NodeOutput::success(update, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(len: usize) -> String {
        "x".repeat(len)
    }

    #[test]
    fn test_long_report_passes() {
        let decision = evaluate_consensus(0, Some(&report(600)), &ConsensusPolicy::default()).unwrap();
        assert!(decision.consensus_reached);
        assert_eq!(decision.revision_count, 0);
        assert_eq!(decision.reason, ConsensusReason::QualityMet);
    }

    #[test]
    fn test_short_report_requests_revision() {
        let decision = evaluate_consensus(0, Some(&report(100)), &ConsensusPolicy::default()).unwrap();
        assert!(!decision.consensus_reached);
        assert_eq!(decision.revision_count, 1);
    }

    #[test]
    fn test_revision_limit_forces_termination() {
        let decision = evaluate_consensus(2, Some(&report(100)), &ConsensusPolicy::default()).unwrap();
        assert!(decision.consensus_reached);
        assert_eq!(decision.revision_count, 2);
        assert_eq!(decision.reason, ConsensusReason::RevisionLimit);
    }

    #[test]
    fn test_threshold_is_exclusive_and_counts_chars() {
        let policy = ConsensusPolicy::default();
        assert!(!evaluate_consensus(0, Some(&report(500)), &policy).unwrap().consensus_reached);
        assert!(evaluate_consensus(0, Some(&report(501)), &policy).unwrap().consensus_reached);

        let wide = "é".repeat(300);
        assert!(!evaluate_consensus(0, Some(&wide), &policy).unwrap().consensus_reached);
    }

    #[test]
    fn test_missing_report_counts_as_empty() {
        let decision = evaluate_consensus(1, None, &ConsensusPolicy::default()).unwrap();
        assert!(!decision.consensus_reached);
        assert_eq!(decision.revision_count, 2);
    }

    #[test]
    fn test_counter_reaches_max_without_wrapping() {
        let policy = ConsensusPolicy {
            max_revisions: u32::MAX,
            quality_threshold: 500,
        };

        let decision = evaluate_consensus(u32::MAX - 1, None, &policy).unwrap();
        assert_eq!(decision.revision_count, u32::MAX);

        let decision = evaluate_consensus(u32::MAX, None, &policy).unwrap();
        assert_eq!(decision.reason, ConsensusReason::RevisionLimit);
    }

    #[test]
    fn test_node_writes_decision_and_stage() {
        let mut state = WorkflowState::new();
        state.final_report = Some(report(100));
        state.consensus_reached = true;

        let output = check_consensus(&state, &ConsensusPolicy::default()).unwrap();
        assert_eq!(output.update.consensus_reached, Some(false));
        assert_eq!(output.update.revision_count, Some(1));
        assert_eq!(output.update.stage, Some(Stage::ConsensusChecked));
    }
}
