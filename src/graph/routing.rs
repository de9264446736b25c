//! Pure routing functions over workflow state.

use crate::models::{NodeId, Role};
use crate::state::WorkflowState;
use std::collections::BTreeMap;

/// Outcome of the join barrier check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionRoute {
    JoinReady,
    JoinWait,
}

/// Outcome of the consensus gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusRoute {
    Terminate,
    ReviseAgain,
}

/// Where the engine goes after a node finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Proceed(NodeId),
    FanOut([NodeId; 3]),
    Terminate,
}

/// Ready only when all three analyst flags are true; absent keys count as false.
pub fn route_on_completion(flags: &BTreeMap<Role, bool>) -> CompletionRoute {
    let all_done = Role::ANALYSTS
        .iter()
        .all(|role| flags.get(role).copied().unwrap_or(false));

    if all_done {
        CompletionRoute::JoinReady
    } else {
        CompletionRoute::JoinWait
    }
}

pub fn route_on_consensus(consensus_reached: bool) -> ConsensusRoute {
    if consensus_reached {
        ConsensusRoute::Terminate
    } else {
        ConsensusRoute::ReviseAgain
    }
}

/// Successor of `node` given the state after its update was applied.
///
/// The barrier waits by yielding no successor; the engine re-evaluates it
/// as outstanding analyses land.
pub fn next_step(node: NodeId, state: &WorkflowState) -> Option<NextStep> {
    match node {
        NodeId::Coordinator => Some(NextStep::FanOut([
            NodeId::FundamentalAnalysis,
            NodeId::TechnicalAnalysis,
            NodeId::RiskAnalysis,
        ])),
        NodeId::FundamentalAnalysis | NodeId::TechnicalAnalysis | NodeId::RiskAnalysis => {
            Some(NextStep::Proceed(NodeId::JoinBarrier))
        }
        NodeId::JoinBarrier => match route_on_completion(&state.completion_flags) {
            CompletionRoute::JoinReady => Some(NextStep::Proceed(NodeId::PeerReview)),
            CompletionRoute::JoinWait => None,
        },
        NodeId::PeerReview => Some(NextStep::Proceed(NodeId::Synthesis)),
        NodeId::Synthesis => Some(NextStep::Proceed(NodeId::ConsensusGate)),
        NodeId::ConsensusGate => match route_on_consensus(state.consensus_reached) {
            ConsensusRoute::Terminate => Some(NextStep::Terminate),
            ConsensusRoute::ReviseAgain => Some(NextStep::Proceed(NodeId::PeerReview)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_routing_truth_table() {
        for mask in 0u8..8 {
            let mut flags = BTreeMap::new();
            for (i, role) in Role::ANALYSTS.iter().enumerate() {
                flags.insert(*role, mask & (1 << i) != 0);
            }

            let expected = if mask == 0b111 {
                CompletionRoute::JoinReady
            } else {
                CompletionRoute::JoinWait
            };
            assert_eq!(route_on_completion(&flags), expected, "mask {:03b}", mask);
        }
    }

    #[test]
    fn test_absent_flags_count_as_incomplete() {
        assert_eq!(route_on_completion(&BTreeMap::new()), CompletionRoute::JoinWait);

        let mut flags = BTreeMap::new();
        flags.insert(Role::Fundamental, true);
        flags.insert(Role::Technical, true);
        assert_eq!(route_on_completion(&flags), CompletionRoute::JoinWait);
    }

    #[test]
    fn test_consensus_routing() {
        assert_eq!(route_on_consensus(true), ConsensusRoute::Terminate);
        assert_eq!(route_on_consensus(false), ConsensusRoute::ReviseAgain);
    }

    #[test]
    fn test_topology() {
        let mut state = WorkflowState::new();

        assert!(matches!(
            next_step(NodeId::Coordinator, &state),
            Some(NextStep::FanOut(_))
        ));
        assert_eq!(
            next_step(NodeId::RiskAnalysis, &state),
            Some(NextStep::Proceed(NodeId::JoinBarrier))
        );
        assert_eq!(next_step(NodeId::JoinBarrier, &state), None);

        for role in Role::ANALYSTS {
            state.completion_flags.insert(role, true);
        }
        assert_eq!(
            next_step(NodeId::JoinBarrier, &state),
            Some(NextStep::Proceed(NodeId::PeerReview))
        );

        assert_eq!(
            next_step(NodeId::ConsensusGate, &state),
            Some(NextStep::Proceed(NodeId::PeerReview))
        );
        state.consensus_reached = true;
        assert_eq!(next_step(NodeId::ConsensusGate, &state), Some(NextStep::Terminate));
    }
}
