//! Coordinator node: resolves the query and announces the run.

use crate::errors::WorkflowError;
use crate::models::{Author, Message, Role, Stage};
use crate::nodes::NodeOutput;
use crate::report::format_analysis_output;
use crate::state::{StateUpdate, WorkflowState};
use tracing::info;

/// Resolve the query and post the start message.
pub fn coordinate(state: &WorkflowState) -> Result<NodeOutput, WorkflowError> {
    let query = state.query().ok_or(WorkflowError::MissingQuery)?.to_string();

    info!("🚀 Coordinator starting multi-analyst review: {}", query);

    let analysts = Role::ANALYSTS
        .iter()
        .map(|r| r.title())
        .collect::<Vec<_>>()
        .join(", ");
    let start_message = format_analysis_output(
        "Multi-analyst review started",
        &format!(
            "Task: {}\nDispatching in parallel: {}",
            query, analysts
        ),
        "Coordinator",
    );

    let update = StateUpdate::new()
        .query(query.clone())
        .message(Message::new(Author::Coordinator, start_message))
        .stage(Stage::Coordinating);

    Ok(NodeOutput::success(update, format!("query resolved: {}", query)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_resolves_first_message() {
        let state = WorkflowState::with_transcript(vec![Message::user("Evaluate Company X")]);
        let output = coordinate(&state).unwrap();

        assert_eq!(output.update.original_query.as_deref(), Some("Evaluate Company X"));
        assert_eq!(output.update.stage, Some(Stage::Coordinating));
        assert!(output.update.transcript[0]
            .content
            .contains("Fundamental Analyst, Technical Analyst, Risk Analyst"));
    }

    #[test]
    fn test_coordinator_rejects_missing_query() {
        let state = WorkflowState::new();
        assert!(matches!(coordinate(&state), Err(WorkflowError::MissingQuery)));
    }
}
