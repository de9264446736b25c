//! Markdown and JSON report generation.
//!
//! This module renders the terminal workflow state as a Markdown document
//! or as pretty-printed JSON.

use crate::models::{Author, FeedbackRecord, Role};
use crate::state::{ExecutionStep, WorkflowState};
use anyhow::{Context, Result};
use std::path::Path;

/// Which optional sections to render.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub include_transcript: bool,
    pub include_timeline: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_transcript: false,
            include_timeline: true,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(state: &WorkflowState, options: ReportOptions) -> String {
    let mut output = String::new();

    output.push_str("# Analyst Panel Report\n\n");
    output.push_str(&generate_metadata_section(state));
    output.push_str(&generate_final_report_section(state.final_report.as_deref()));
    output.push_str(&generate_analyses_section(state));
    output.push_str(&generate_feedback_section(&state.feedback_artifacts));

    if options.include_timeline {
        output.push_str(&generate_timeline_section(&state.timeline));
    }
    if options.include_transcript {
        output.push_str(&generate_transcript_section(state));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the metadata section.
fn generate_metadata_section(state: &WorkflowState) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Run:** `{}`\n", state.run_id));
    if let Some(query) = state.query() {
        section.push_str(&format!("- **Query:** {}\n", query));
    }
    section.push_str(&format!(
        "- **Started:** {}\n",
        state.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Duration:** {}ms\n", state.duration_ms()));
    section.push_str(&format!("- **Stage:** {}\n", state.stage));
    section.push_str(&format!("- **Revisions:** {}\n", state.revision_count));
    section.push_str(&format!(
        "- **Consensus:** {}\n",
        if state.consensus_reached { "reached" } else { "not reached" }
    ));

    let failed = state.analysis_log.iter().filter(|e| e.failed).count();
    if failed > 0 {
        section.push_str(&format!("- **Failed Analyses:** {}\n", failed));
    }
    section.push('\n');

    section
}

fn generate_final_report_section(report: Option<&str>) -> String {
    let mut section = String::from("## Final Report\n\n");
    match report {
        Some(text) if !text.trim().is_empty() => {
            section.push_str(text.trim_end());
            section.push_str("\n\n");
        }
        _ => section.push_str("*No report was produced.*\n\n"),
    }
    section
}

/// Analyses regrouped by role, since arrival order is not deterministic.
fn generate_analyses_section(state: &WorkflowState) -> String {
    let mut section = String::from("## Specialist Analyses\n\n");
    let grouped = state.analyses_by_role();

    for role in Role::ANALYSTS {
        section.push_str(&format!("### {} {}\n\n", role.emoji(), role.report_title()));
        match grouped.get(&role) {
            Some(entries) => {
                for entry in entries {
                    if entry.failed {
                        section.push_str(&format!("> ❌ {}\n\n", entry.text));
                    } else {
                        section.push_str(entry.text.trim_end());
                        section.push_str("\n\n");
                    }
                }
            }
            None => section.push_str("*No analysis recorded.*\n\n"),
        }
    }

    section
}

fn generate_feedback_section(feedback: &[FeedbackRecord]) -> String {
    if feedback.is_empty() {
        return String::new();
    }

    let mut section = String::from("## Peer Review\n\n");
    section.push_str("| Reviewer | Confidence | Suggested Improvements |\n");
    section.push_str("|:---|:---:|:---|\n");

    for record in feedback {
        let improvements = if record.suggested_improvements.is_empty() {
            "-".to_string()
        } else {
            record.suggested_improvements.join("; ")
        };
        section.push_str(&format!(
            "| {} | {:.2} | {} |\n",
            record.source_role.title(),
            record.confidence_score,
            improvements.replace('|', "\\|")
        ));
    }
    section.push('\n');

    section
}

fn generate_timeline_section(timeline: &[ExecutionStep]) -> String {
    if timeline.is_empty() {
        return String::new();
    }

    let mut section = String::from("## Timeline\n\n");
    section.push_str("| # | Node | Stage | Result | Duration | Summary |\n");
    section.push_str("|:---:|:---|:---|:---:|---:|:---|\n");

    for (i, step) in timeline.iter().enumerate() {
        section.push_str(&format!(
            "| {} | `{}` | {} | {} | {}ms | {} |\n",
            i + 1,
            step.node,
            step.stage,
            if step.success { "✅" } else { "⚠️" },
            (step.completed_at - step.started_at).num_milliseconds(),
            step.summary.replace('|', "\\|")
        ));
    }
    section.push('\n');

    section
}

fn generate_transcript_section(state: &WorkflowState) -> String {
    let mut section = String::from("## Transcript\n\n");

    for message in &state.transcript {
        let author = match message.author {
            Author::User => "User".to_string(),
            Author::Coordinator => "Coordinator".to_string(),
            Author::Analyst(role) => role.title().to_string(),
            Author::PeerReview => "Peer Review".to_string(),
            Author::System => "System".to_string(),
        };
        section.push_str(&format!("**{}**\n\n```text\n{}\n```\n\n", author, message.content.trim_end()));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by analyst-panel*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(state: &WorkflowState) -> Result<String> {
    serde_json::to_string_pretty(state).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisEntry, Message, NodeId, Stage};
    use chrono::Utc;

    fn create_test_state() -> WorkflowState {
        let mut state = WorkflowState::with_transcript(vec![Message::user("Evaluate Company X")]);
        state.original_query = Some("Evaluate Company X".to_string());
        state.analysis_log = vec![
            AnalysisEntry::completed(Role::Technical, "Uptrend above MA20"),
            AnalysisEntry::failed(Role::Fundamental, "timeout"),
            AnalysisEntry::completed(Role::Risk, "Beta 1.2"),
        ];
        state.feedback_artifacts = vec![
            FeedbackRecord::new(Role::Fundamental, "fine", 0.8, vec!["Add PEG".to_string()]),
            FeedbackRecord::placeholder(Role::Technical),
        ];
        state.final_report = Some("Rating: Outperform".to_string());
        state.consensus_reached = true;
        state.record_step(NodeId::Coordinator, Utc::now(), true, "query resolved");
        state.complete();
        state
    }

    #[test]
    fn test_generate_markdown_report() {
        let state = create_test_state();
        let markdown = generate_markdown_report(&state, ReportOptions::default());

        assert!(markdown.contains("# Analyst Panel Report"));
        assert!(markdown.contains("- **Query:** Evaluate Company X"));
        assert!(markdown.contains("- **Stage:** done"));
        assert!(markdown.contains("- **Failed Analyses:** 1"));
        assert!(markdown.contains("Rating: Outperform"));
        assert!(markdown.contains("## Peer Review"));
        assert!(markdown.contains("## Timeline"));
        assert!(!markdown.contains("## Transcript"));
    }

    #[test]
    fn test_analyses_are_grouped_in_role_order() {
        let state = create_test_state();
        let section = generate_analyses_section(&state);

        let fundamental = section.find("Fundamental Analysis Report").unwrap();
        let technical = section.find("Technical Analysis Report").unwrap();
        let risk = section.find("Risk Assessment Report").unwrap();
        assert!(fundamental < technical && technical < risk);
        assert!(section.contains("> ❌ analysis failed - timeout"));
    }

    #[test]
    fn test_missing_report_placeholder() {
        let section = generate_final_report_section(None);
        assert!(section.contains("No report was produced"));
    }

    #[test]
    fn test_transcript_section_is_optional() {
        let state = create_test_state();
        let markdown = generate_markdown_report(
            &state,
            ReportOptions {
                include_transcript: true,
                include_timeline: false,
            },
        );
        assert!(markdown.contains("## Transcript"));
        assert!(!markdown.contains("## Timeline"));
        assert_eq!(state.stage, Stage::Done);
    }

    #[test]
    fn test_generate_json_report() {
        let state = create_test_state();
        let json = generate_json_report(&state).unwrap();

        assert!(json.contains("\"run_id\""));
        assert!(json.contains("\"analysis_log\""));
        assert!(json.contains("\"completion_flags\""));
        assert!(json.contains("\"stage\": \"done\""));
    }
}
