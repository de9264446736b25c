//! Workflow state and merge semantics.
//!
//! Nodes never mutate [`WorkflowState`] directly. Each node returns a
//! [`StateUpdate`] that the engine applies. Sibling updates produced by a
//! fan-out are first combined with [`StateUpdate::merge_concurrent`], so every
//! sibling sees only the pre-fan-out snapshot.

use crate::errors::WorkflowError;
use crate::models::{AnalysisEntry, FeedbackRecord, Message, NodeId, Role, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Append-list merge: `existing` followed by `incoming`.
///
/// A single item is passed as a one-element iterator (`Some(item)` or `[item]`).
pub fn merge_append_list<T>(mut existing: Vec<T>, incoming: impl IntoIterator<Item = T>) -> Vec<T> {
    existing.extend(incoming);
    existing
}

/// Key-wise overwrite union: incoming keys replace existing values, other keys survive.
pub fn merge_union_map<K: Ord, V>(
    mut existing: BTreeMap<K, V>,
    incoming: impl IntoIterator<Item = (K, V)>,
) -> BTreeMap<K, V> {
    existing.extend(incoming);
    existing
}

/// Execution step record for the run timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Node that was executed
    pub node: NodeId,
    /// Stage after the node's update was applied
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Whether the node completed without substituting fallback content
    pub success: bool,
    /// Brief summary of what happened
    pub summary: String,
}

/// The single record threaded through every node of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Unique run identifier
    pub run_id: String,
    /// Query under analysis, set once by the coordinator
    pub original_query: Option<String>,
    /// Formatted messages, starting with the caller's input
    pub transcript: Vec<Message>,
    /// Role-tagged analyses; order across concurrent writers is unspecified
    pub analysis_log: Vec<AnalysisEntry>,
    /// Per-role completion; keys are analyst roles only
    pub completion_flags: BTreeMap<Role, bool>,
    /// Peer review records
    pub feedback_artifacts: Vec<FeedbackRecord>,
    /// Revision passes scheduled by the consensus gate
    pub revision_count: u32,
    pub consensus_reached: bool,
    /// Latest synthesized report
    pub final_report: Option<String>,
    /// Advisory stage
    pub stage: Stage,
    /// Per-node execution history
    pub timeline: Vec<ExecutionStep>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    /// Create an empty state for a new run.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            original_query: None,
            transcript: Vec::new(),
            analysis_log: Vec::new(),
            completion_flags: BTreeMap::new(),
            feedback_artifacts: Vec::new(),
            revision_count: 0,
            consensus_reached: false,
            final_report: None,
            stage: Stage::Start,
            timeline: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create state seeded with the caller's transcript.
    pub fn with_transcript(transcript: Vec<Message>) -> Self {
        Self {
            transcript,
            ..Self::new()
        }
    }

    /// The query to analyze: `original_query`, else the first transcript message.
    pub fn query(&self) -> Option<&str> {
        self.original_query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .or_else(|| {
                self.transcript
                    .first()
                    .map(|m| m.content.as_str())
                    .filter(|c| !c.trim().is_empty())
            })
    }

    /// Whether the given analyst role has reported.
    pub fn is_complete(&self, role: Role) -> bool {
        self.completion_flags.get(&role).copied().unwrap_or(false)
    }

    /// Analyst roles that have not reported yet.
    pub fn pending_roles(&self) -> Vec<Role> {
        Role::ANALYSTS
            .into_iter()
            .filter(|r| !self.is_complete(*r))
            .collect()
    }

    /// Analysis entries grouped by role, in fixed role order.
    pub fn analyses_by_role(&self) -> BTreeMap<Role, Vec<&AnalysisEntry>> {
        let mut grouped: BTreeMap<Role, Vec<&AnalysisEntry>> = BTreeMap::new();
        for entry in &self.analysis_log {
            grouped.entry(entry.role).or_default().push(entry);
        }
        grouped
    }

    /// Apply a node's partial update.
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), WorkflowError> {
        if let Some(role) = update.completion_flags.keys().find(|r| !r.is_analyst()) {
            return Err(WorkflowError::UnknownCompletionKey(*role));
        }

        if let Some(query) = update.original_query {
            match &self.original_query {
                Some(existing) if *existing != query => {
                    return Err(WorkflowError::MergeConflict {
                        field: "original_query",
                    });
                }
                _ => self.original_query = Some(query),
            }
        }

        self.transcript = merge_append_list(std::mem::take(&mut self.transcript), update.transcript);
        self.analysis_log =
            merge_append_list(std::mem::take(&mut self.analysis_log), update.analysis_log);
        self.completion_flags = merge_union_map(
            std::mem::take(&mut self.completion_flags),
            update.completion_flags,
        );
        self.feedback_artifacts = merge_append_list(
            std::mem::take(&mut self.feedback_artifacts),
            update.feedback_artifacts,
        );

        if let Some(count) = update.revision_count {
            self.revision_count = count;
        }
        if let Some(reached) = update.consensus_reached {
            self.consensus_reached = reached;
        }
        if let Some(report) = update.final_report {
            self.final_report = Some(report);
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }

        Ok(())
    }

    /// Record a node execution in the timeline.
    pub fn record_step(
        &mut self,
        node: NodeId,
        started_at: DateTime<Utc>,
        success: bool,
        summary: impl Into<String>,
    ) {
        self.timeline.push(ExecutionStep {
            node,
            stage: self.stage,
            started_at,
            completed_at: Utc::now(),
            success,
            summary: summary.into(),
        });
    }

    /// Mark the run as finished.
    pub fn complete(&mut self) {
        self.stage = Stage::Done;
        self.completed_at = Some(Utc::now());
    }

    /// Total run time in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

/// A partial update produced by one node.
///
/// List fields append, `completion_flags` unions, everything else is
/// last-write-wins and left untouched when `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub original_query: Option<String>,
    pub transcript: Vec<Message>,
    pub analysis_log: Vec<AnalysisEntry>,
    pub completion_flags: BTreeMap<Role, bool>,
    pub feedback_artifacts: Vec<FeedbackRecord>,
    pub revision_count: Option<u32>,
    pub consensus_reached: Option<bool>,
    pub final_report: Option<String>,
    pub stage: Option<Stage>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.original_query = Some(query.into());
        self
    }

    pub fn message(mut self, message: Message) -> Self {
        self.transcript.push(message);
        self
    }

    pub fn analysis(mut self, entry: AnalysisEntry) -> Self {
        self.analysis_log.push(entry);
        self
    }

    pub fn completed(mut self, role: Role) -> Self {
        self.completion_flags.insert(role, true);
        self
    }

    pub fn feedback(mut self, records: impl IntoIterator<Item = FeedbackRecord>) -> Self {
        self.feedback_artifacts.extend(records);
        self
    }

    pub fn revision_count(mut self, count: u32) -> Self {
        self.revision_count = Some(count);
        self
    }

    pub fn consensus(mut self, reached: bool) -> Self {
        self.consensus_reached = Some(reached);
        self
    }

    pub fn final_report(mut self, report: impl Into<String>) -> Self {
        self.final_report = Some(report.into());
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Combine updates from concurrently executed siblings.
    ///
    /// Append and map fields merge with their declared rules. A
    /// last-write-wins field set by more than one sibling has no merge rule
    /// and is rejected.
    pub fn merge_concurrent(
        updates: impl IntoIterator<Item = StateUpdate>,
    ) -> Result<StateUpdate, WorkflowError> {
        let mut merged = StateUpdate::default();

        for update in updates {
            merged.transcript = merge_append_list(merged.transcript, update.transcript);
            merged.analysis_log = merge_append_list(merged.analysis_log, update.analysis_log);
            merged.completion_flags =
                merge_union_map(merged.completion_flags, update.completion_flags);
            merged.feedback_artifacts =
                merge_append_list(merged.feedback_artifacts, update.feedback_artifacts);

            take_single_writer(&mut merged.original_query, update.original_query, "original_query")?;
            take_single_writer(&mut merged.revision_count, update.revision_count, "revision_count")?;
            take_single_writer(
                &mut merged.consensus_reached,
                update.consensus_reached,
                "consensus_reached",
            )?;
            take_single_writer(&mut merged.final_report, update.final_report, "final_report")?;
            take_single_writer(&mut merged.stage, update.stage, "stage")?;
        }

        Ok(merged)
    }
}

fn take_single_writer<T>(
    slot: &mut Option<T>,
    incoming: Option<T>,
    field: &'static str,
) -> Result<(), WorkflowError> {
    match (slot.is_some(), incoming) {
        (true, Some(_)) => Err(WorkflowError::MergeConflict { field }),
        (false, Some(value)) => {
            *slot = Some(value);
            Ok(())
        }
        (_, None) => Ok(()),
    }
}
