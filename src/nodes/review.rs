//! Peer review stage.
//!
//! Each analyst critiques the other two against its own rubric. The three
//! reviews are independent and run concurrently; a failed review becomes a
//! placeholder record rather than aborting the stage.

use crate::analyst::AnalystPanel;
use crate::models::{Author, FeedbackRecord, Message, Role, Stage, DEFAULT_IMPROVEMENT};
use crate::nodes::NodeOutput;
use crate::report::format_review_output;
use crate::state::{StateUpdate, WorkflowState};
use futures::future::join_all;
use tracing::{error, info, warn};

pub const EMPTY_REVIEW_MESSAGE: &str = "[Peer review] No analysis results are available for review";

/// Review criteria for each analyst role.
fn rubric(role: Role) -> &'static [&'static str] {
    match role {
        Role::Fundamental => &[
            "Is the reasoning sound?",
            "Is it consistent with the fundamental picture?",
            "What is missing or wrong?",
        ],
        Role::Technical => &[
            "Does it account for the technical market setup?",
            "Is the timing call reasonable?",
            "Are the price targets supported by technical levels?",
        ],
        Role::Risk | Role::Senior => &[
            "Are the risk factors fully identified?",
            "Is the risk assessment objective and accurate?",
            "Are the risk control recommendations practical?",
        ],
    }
}

/// Material under review: every analysis, plus the current draft on revision passes.
fn review_context(state: &WorkflowState) -> String {
    let mut context = state
        .analysis_log
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(draft) = state.final_report.as_deref().filter(|r| !r.trim().is_empty()) {
        context.push_str("\n\nCurrent draft report:\n");
        context.push_str(draft);
    }
    context
}

/// Task text for one reviewer.
pub fn review_task(role: Role, context: &str) -> String {
    let peers = role
        .peers()
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(" and ");

    let mut task = format!(
        "As the {}, review the quality of the {} analyses below.\n\n{}\n\nFocus on:\n",
        role.title(),
        peers,
        context
    );
    for (i, question) in rubric(role).iter().enumerate() {
        task.push_str(&format!("{}. {}\n", i + 1, question));
    }
    task.push_str(&format!(
        "{}. Propose concrete improvements\n\nFormat:\n[{} review]\nReview comments: ...\nSuggestions:\n- ...\n",
        rubric(role).len() + 1,
        role.title()
    ));
    task
}

/// Pull the list items out of a review's suggestions section.
pub fn extract_suggestions(review: &str) -> Vec<String> {
    let mut suggestions = Vec::new();
    let mut in_section = false;

    for line in review.lines() {
        let trimmed = line.trim();

        if !in_section {
            let heading = trimmed
                .trim_start_matches(['#', '*'])
                .trim_start()
                .to_lowercase();
            if heading.starts_with("suggestions")
                || heading.starts_with("improvement suggestions")
                || heading.starts_with("suggested improvements")
            {
                in_section = true;
                if let Some((_, rest)) = trimmed.split_once(':') {
                    let rest = rest.trim().trim_matches('*').trim();
                    if !rest.is_empty() && rest != "..." {
                        suggestions.push(rest.to_string());
                    }
                }
            }
            continue;
        }

        if trimmed.is_empty() {
            if suggestions.is_empty() {
                continue;
            }
            break;
        }

        match list_item(trimmed) {
            Some(item) => suggestions.push(item.to_string()),
            None => break,
        }
    }

    suggestions
}

fn list_item(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return Some(rest.trim()).filter(|s| !s.is_empty());
    }

    let digits = line.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(['.', ')'])?;
    Some(rest.trim()).filter(|s| !s.is_empty())
}

/// Run the three peer reviews and collect one feedback record per reviewer.
pub async fn peer_review(
    state: &WorkflowState,
    panel: &AnalystPanel,
    review_confidence: f32,
) -> NodeOutput {
    info!("🔍 Peer review started");

    if state.analysis_log.is_empty() {
        warn!("⚠️ No analysis results found, skipping peer review");
        let update = StateUpdate::new()
            .message(Message::new(Author::PeerReview, EMPTY_REVIEW_MESSAGE))
            .stage(Stage::Reviewing);
        return NodeOutput::success(update, "nothing to review");
    }

    let context = review_context(state);
    let reviews = join_all(Role::ANALYSTS.iter().map(|&role| {
        let analyst = panel.for_role(role);
        let task = review_task(role, &context);
        async move {
            let outcome = analyst.invoke(role, &task, role.capability_set()).await;
            (role, outcome)
        }
    }))
    .await;

    let mut records = Vec::with_capacity(reviews.len());
    let mut texts = Vec::with_capacity(reviews.len());

    for (role, outcome) in reviews {
        let record = match outcome {
            Ok(content) => {
                info!("✅ {} review completed", role.title());
                let mut improvements = extract_suggestions(&content);
                if improvements.is_empty() {
                    improvements.push(DEFAULT_IMPROVEMENT.to_string());
                }
                FeedbackRecord::new(
                    role,
                    format!("[{} review]\n{}", role.title(), content.trim()),
                    review_confidence,
                    improvements,
                )
            }
            Err(e) => {
                error!("❌ {} review failed: {}", role.title(), e);
                FeedbackRecord::placeholder(role)
            }
        };
        texts.push(record.feedback_text.clone());
        records.push(record);
    }

    let failed = records.iter().filter(|r| r.is_placeholder()).count();
    info!("🎯 Peer review finished with {} reviews", records.len());

    let update = StateUpdate::new()
        .message(Message::new(Author::PeerReview, format_review_output(&texts)))
        .feedback(records)
        .stage(Stage::Reviewing);

    if failed == 0 {
        NodeOutput::success(update, "3 reviews collected")
    } else {
        NodeOutput::degraded(update, format!("{} of 3 reviews failed", failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::testing::ScriptedAnalyst;
    use crate::models::AnalysisEntry;
    use std::sync::Arc;

    fn reviewed_state() -> WorkflowState {
        let mut state = WorkflowState::new();
        state.analysis_log = vec![
            AnalysisEntry::completed(Role::Fundamental, "PE of 25"),
            AnalysisEntry::completed(Role::Technical, "Uptrend"),
            AnalysisEntry::failed(Role::Risk, "timeout"),
        ];
        state
    }

    #[tokio::test]
    async fn test_empty_log_short_circuits() {
        let analyst = Arc::new(ScriptedAnalyst::with_len(10));
        let panel = AnalystPanel::uniform(analyst.clone());

        let output = peer_review(&WorkflowState::new(), &panel, 0.8).await;

        assert_eq!(analyst.calls(), 0);
        assert!(output.update.feedback_artifacts.is_empty());
        assert_eq!(output.update.stage, Some(Stage::Reviewing));
        assert_eq!(output.update.transcript[0].content, EMPTY_REVIEW_MESSAGE);
    }

    #[tokio::test]
    async fn test_one_record_per_reviewer_in_role_order() {
        let analyst = Arc::new(ScriptedAnalyst::replying(|_, _| {
            "Review comments: fine\nSuggestions:\n- Add a DCF\n2. Quantify downside\n\nThanks".to_string()
        }));
        let panel = AnalystPanel::uniform(analyst.clone());

        let output = peer_review(&reviewed_state(), &panel, 0.8).await;

        assert_eq!(analyst.calls(), 3);
        let roles: Vec<Role> = output
            .update
            .feedback_artifacts
            .iter()
            .map(|r| r.source_role)
            .collect();
        assert_eq!(roles, Role::ANALYSTS.to_vec());

        let first = &output.update.feedback_artifacts[0];
        assert_eq!(first.confidence_score, 0.8);
        assert_eq!(first.suggested_improvements, vec!["Add a DCF", "Quantify downside"]);
        assert!(first.feedback_text.starts_with("[Fundamental Analyst review]"));
        assert_eq!(output.update.transcript.len(), 1);
        assert!(output.success);
    }

    #[tokio::test]
    async fn test_failed_reviewer_becomes_placeholder() {
        let analyst = Arc::new(ScriptedAnalyst::with_len(20).failing_for(Role::Technical));
        let panel = AnalystPanel::uniform(analyst.clone());

        let output = peer_review(&reviewed_state(), &panel, 0.8).await;
        let records = &output.update.feedback_artifacts;

        assert_eq!(records.len(), 3);
        assert!(records[1].is_placeholder());
        assert_eq!(records[1].confidence_score, 0.0);
        assert_eq!(records[0].suggested_improvements, vec![DEFAULT_IMPROVEMENT]);
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_reviewers_see_each_analysis_and_peers() {
        let analyst = Arc::new(ScriptedAnalyst::with_len(10));
        let panel = AnalystPanel::uniform(analyst.clone());

        peer_review(&reviewed_state(), &panel, 0.8).await;

        for (role, task, _) in analyst.tasks() {
            assert!(task.contains("fundamental: PE of 25"));
            assert!(task.contains("risk: analysis failed - timeout"));
            let peers = role.peers();
            assert!(task.contains(&format!("{} and {}", peers[0], peers[1])));
        }
    }

    #[tokio::test]
    async fn test_revision_pass_includes_draft() {
        let mut state = reviewed_state();
        state.final_report = Some("Draft: hold".to_string());
        let analyst = Arc::new(ScriptedAnalyst::with_len(10));
        let panel = AnalystPanel::uniform(analyst.clone());

        peer_review(&state, &panel, 0.8).await;

        assert!(analyst.tasks()[0].1.contains("Current draft report:\nDraft: hold"));
    }

    #[test]
    fn test_extract_suggestions() {
        let review = "Review comments: ok\n**Suggestions:**\n- One\n* Two\n3) Three\nClosing remark";
        assert_eq!(extract_suggestions(review), vec!["One", "Two", "Three"]);

        let inline = "Improvement suggestions: tighten the stop loss";
        assert_eq!(extract_suggestions(inline), vec!["tighten the stop loss"]);

        assert!(extract_suggestions("No structure at all").is_empty());
        assert!(extract_suggestions("Suggestions: ...").is_empty());
    }
}
