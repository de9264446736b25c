//! Synthesis stage: the investment director consolidates everything.

use crate::analyst::Analyst;
use crate::errors::CapabilityError;
use crate::models::{Author, Message, Role, Stage};
use crate::nodes::NodeOutput;
use crate::report::format_final_report;
use crate::state::{StateUpdate, WorkflowState};
use std::fmt;
use tracing::{error, info};

/// Every non-user transcript message, blank-line separated.
fn synthesis_context(state: &WorkflowState) -> String {
    state
        .transcript
        .iter()
        .filter(|m| !m.is_user())
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn synthesis_task(context: &str) -> String {
    format!(
        "As the investment director, consolidate the specialist analyses and peer reviews below \
         into the final investment report.\n\n{}\n\n\
         Provide:\n\
         1. 📋 Executive summary\n\
         2. 🎯 Consolidated investment recommendation\n\
         3. ⚠️ Key risk callouts\n\
         4. 📊 Rating and price target\n\
         5. 🔍 Assessment of how well the specialist analyses agree\n\n\
         Resolve contradictions between the analyses and keep the conclusions actionable.",
        context
    )
}

/// The report stored when the senior analyst cannot produce one.
pub fn synthesis_failure_report(error: impl fmt::Display) -> String {
    format!("Synthesis failed: {}", error)
}

/// Invoke the senior analyst once and store its report.
///
/// Consensus is marked reached either way; the consensus gate has the
/// final say.
pub async fn synthesize(state: &WorkflowState, analyst: &dyn Analyst) -> NodeOutput {
    info!("🎯 Investment director started synthesis");

    let task = synthesis_task(&synthesis_context(state));
    let role = Role::Senior;

    let outcome = analyst
        .invoke(role, &task, role.capability_set())
        .await
        .and_then(|report| {
            if report.trim().is_empty() {
                Err(CapabilityError::InvalidResponse("empty report".to_string()))
            } else {
                Ok(report)
            }
        });

    match outcome {
        Ok(report) => {
            info!("✅ Final report generated ({} chars)", report.chars().count());
            let update = StateUpdate::new()
                .message(Message::new(Author::Analyst(role), format_final_report(&report)))
                .final_report(report)
                .consensus(true)
                .stage(Stage::Synthesizing);
            NodeOutput::success(update, "final report generated")
        }
        Err(e) => {
            error!("❌ Synthesis failed: {}", e);
            let update = StateUpdate::new()
                .message(Message::new(
                    Author::Analyst(role),
                    format_final_report(&format!("Synthesis encountered an error: {}", e)),
                ))
                .final_report(synthesis_failure_report(&e))
                .consensus(true)
                .stage(Stage::Synthesizing);
            NodeOutput::degraded(update, format!("synthesis failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::testing::ScriptedAnalyst;
    use crate::models::CapabilitySet;

    fn state_with_transcript() -> WorkflowState {
        WorkflowState::with_transcript(vec![
            Message::user("Evaluate Company X"),
            Message::new(Author::Analyst(Role::Fundamental), "fundamental view"),
            Message::new(Author::PeerReview, "review notes"),
        ])
    }

    #[tokio::test]
    async fn test_synthesis_success() {
        let analyst = ScriptedAnalyst::replying(|_, _| "Rating: Outperform".to_string());
        let output = synthesize(&state_with_transcript(), &analyst).await;

        assert!(output.success);
        assert_eq!(output.update.final_report.as_deref(), Some("Rating: Outperform"));
        assert_eq!(output.update.consensus_reached, Some(true));
        assert_eq!(output.update.stage, Some(Stage::Synthesizing));
        assert!(output.update.transcript[0]
            .content
            .contains("Final Consolidated Investment Report"));
    }

    #[tokio::test]
    async fn test_context_excludes_user_messages() {
        let analyst = ScriptedAnalyst::with_len(10);
        synthesize(&state_with_transcript(), &analyst).await;

        let (role, task, set) = analyst.tasks().remove(0);
        assert_eq!(role, Role::Senior);
        assert_eq!(set, CapabilitySet::Extended);
        assert!(task.contains("fundamental view\n\nreview notes"));
        assert!(!task.contains("Evaluate Company X"));
    }

    #[tokio::test]
    async fn test_blank_report_is_treated_as_failure() {
        for reply in ["", "  \n\t "] {
            let analyst = ScriptedAnalyst::replying(move |role, _| {
                if role == Role::Senior {
                    reply.to_string()
                } else {
                    "x".repeat(50)
                }
            });
            let output = synthesize(&state_with_transcript(), &analyst).await;

            assert!(!output.success);
            assert_eq!(output.update.consensus_reached, Some(true));
            assert_eq!(
                output.update.final_report.as_deref(),
                Some("Synthesis failed: invalid model response: empty report")
            );
        }
    }

    #[tokio::test]
    async fn test_synthesis_failure_still_reaches_consensus() {
        let analyst = ScriptedAnalyst::with_len(10).failing_for(Role::Senior);
        let output = synthesize(&state_with_transcript(), &analyst).await;

        assert!(!output.success);
        assert_eq!(output.update.consensus_reached, Some(true));
        assert_eq!(output.update.stage, Some(Stage::Synthesizing));
        assert!(output
            .update
            .final_report
            .as_deref()
            .unwrap()
            .starts_with("Synthesis failed: "));
    }
}
