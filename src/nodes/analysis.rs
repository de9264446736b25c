//! Parametrized analysis executor.
//!
//! One routine serves the fundamental, technical and risk analysts. A
//! failed invocation still marks the role complete so the join barrier
//! never waits on it.

use crate::analyst::Analyst;
use crate::errors::{CapabilityError, WorkflowError};
use crate::models::{AnalysisEntry, Author, Message, Role};
use crate::nodes::NodeOutput;
use crate::report::format_analysis_output;
use crate::state::{StateUpdate, WorkflowState};
use std::fmt;
use tracing::{error, info, warn};

/// Task text handed to the analyst for `role`.
pub fn analysis_task(role: Role, query: &str) -> String {
    let framing = match role {
        Role::Fundamental => "Perform an in-depth fundamental analysis of",
        Role::Technical => "Perform a professional technical analysis of",
        Role::Risk => "Perform a comprehensive risk assessment of",
        Role::Senior => "Assess",
    };
    format!("{}: {}", framing, query)
}

/// Run one analyst against the pre-fan-out snapshot.
pub async fn run_analysis(
    role: Role,
    state: &WorkflowState,
    analyst: &dyn Analyst,
) -> Result<NodeOutput, WorkflowError> {
    let query = state.query().ok_or(WorkflowError::MissingQuery)?;

    info!("{} {} started", role.emoji(), role.title());

    let outcome: Result<String, CapabilityError> = analyst
        .invoke(role, &analysis_task(role, query), role.capability_set())
        .await;

    Ok(match outcome {
        Ok(content) => analysis_success(role, content),
        Err(e) => {
            if e.is_transport() {
                warn!("Model server unreachable for {}; check --ollama-url or run with --offline", role);
            }
            analysis_failure(role, e)
        }
    })
}

fn analysis_success(role: Role, content: String) -> NodeOutput {
    info!("✅ {} completed", role.title());

    let formatted = format_analysis_output(role.report_title(), &content, role.title());
    let update = StateUpdate::new()
        .message(Message::new(Author::Analyst(role), formatted))
        .analysis(AnalysisEntry::completed(role, content))
        .completed(role);

    NodeOutput::success(update, format!("{} analysis completed", role))
}

/// Fallback output for a failed analyst: error-tagged entry, flag still set.
pub fn analysis_failure(role: Role, error: impl fmt::Display) -> NodeOutput {
    error!("❌ {} failed: {}", role.title(), error);

    let formatted = format_analysis_output(
        role.report_title(),
        &format!("The analysis could not be completed: {}", error),
        role.title(),
    );
    let update = StateUpdate::new()
        .message(Message::new(Author::Analyst(role), formatted))
        .analysis(AnalysisEntry::failed(role, &error))
        .completed(role);

    NodeOutput::degraded(update, format!("{} analysis failed: {}", role, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::testing::ScriptedAnalyst;
    use crate::models::CapabilitySet;

    fn snapshot() -> WorkflowState {
        let mut state = WorkflowState::new();
        state.original_query = Some("Evaluate Company X".to_string());
        state
    }

    #[tokio::test]
    async fn test_success_appends_entry_and_flag() {
        let analyst = ScriptedAnalyst::replying(|_, _| "Solid balance sheet".to_string());
        let output = run_analysis(Role::Fundamental, &snapshot(), &analyst)
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(
            output.update.analysis_log,
            vec![AnalysisEntry::completed(Role::Fundamental, "Solid balance sheet")]
        );
        assert_eq!(output.update.completion_flags.get(&Role::Fundamental), Some(&true));
        assert_eq!(output.update.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_absorbed_for_every_role() {
        for role in Role::ANALYSTS {
            let analyst = ScriptedAnalyst::with_len(10).failing_for(role);
            let output = run_analysis(role, &snapshot(), &analyst).await.unwrap();

            assert!(!output.success);
            assert_eq!(output.update.completion_flags.get(&role), Some(&true));
            let entry = &output.update.analysis_log[0];
            assert!(entry.failed);
            assert!(entry
                .to_string()
                .starts_with(&format!("{}: analysis failed - ", role)));
        }
    }

    #[tokio::test]
    async fn test_capability_sets_per_role() {
        let analyst = ScriptedAnalyst::with_len(10);
        for role in Role::ANALYSTS {
            run_analysis(role, &snapshot(), &analyst).await.unwrap();
        }

        let tasks = analyst.tasks();
        assert_eq!(tasks.len(), 3);
        for (role, task, set) in tasks {
            assert!(task.ends_with(": Evaluate Company X"));
            let expected = if role == Role::Risk {
                CapabilitySet::Extended
            } else {
                CapabilitySet::Base
            };
            assert_eq!(set, expected);
        }
    }

    #[tokio::test]
    async fn test_query_falls_back_to_transcript() {
        let state = WorkflowState::with_transcript(vec![Message::user("Evaluate Company Y")]);
        let analyst = ScriptedAnalyst::with_len(10);
        run_analysis(Role::Technical, &state, &analyst).await.unwrap();

        assert_eq!(
            analyst.tasks()[0].1,
            "Perform a professional technical analysis of: Evaluate Company Y"
        );
    }

    #[tokio::test]
    async fn test_missing_query_is_fatal() {
        let analyst = ScriptedAnalyst::with_len(10);
        let result = run_analysis(Role::Risk, &WorkflowState::new(), &analyst).await;

        assert!(matches!(result, Err(WorkflowError::MissingQuery)));
        assert_eq!(analyst.calls(), 0);
    }
}
