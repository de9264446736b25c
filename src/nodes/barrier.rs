//! Join barrier: blocks until every analyst role has reported.

use crate::graph::routing::{route_on_completion, CompletionRoute};
use crate::models::{Author, Message, Stage};
use crate::nodes::NodeOutput;
use crate::state::{StateUpdate, WorkflowState};
use tracing::{debug, info};

pub const JOIN_READY_MESSAGE: &str = "All specialist analyses are complete; preparing peer review";

/// Check the completion flags and decide whether to release the barrier.
pub fn wait_for_analyses(state: &WorkflowState) -> (CompletionRoute, NodeOutput) {
    let route = route_on_completion(&state.completion_flags);

    let output = match route {
        CompletionRoute::JoinReady => {
            info!("🔗 {}", JOIN_READY_MESSAGE);
            let update = StateUpdate::new()
                .message(Message::new(Author::System, JOIN_READY_MESSAGE))
                .stage(Stage::AnalysesJoined);
            NodeOutput::success(update, "all analyses joined")
        }
        CompletionRoute::JoinWait => {
            let pending = state.pending_roles();
            debug!("Join barrier waiting on: {:?}", pending);
            let names = pending
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            NodeOutput::success(StateUpdate::new(), format!("waiting on {}", names))
        }
    };

    (route, output)
}
