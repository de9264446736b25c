//! Workflow engine.
//!
//! Drives the graph: coordinator, concurrent analysis fan-out, join
//! barrier, peer review, synthesis and the consensus gate, looping back to
//! peer review until the gate terminates the run.

use crate::analyst::AnalystPanel;
use crate::errors::WorkflowError;
use crate::graph::routing::{next_step, NextStep};
use crate::models::{Message, NodeId, Role, Stage};
use crate::nodes::analysis::{analysis_failure, run_analysis};
use crate::nodes::barrier::wait_for_analyses;
use crate::nodes::consensus::{check_consensus, ConsensusPolicy};
use crate::nodes::coordinator::coordinate;
use crate::nodes::review::peer_review;
use crate::nodes::synthesis::synthesize;
use crate::nodes::NodeOutput;
use crate::state::{StateUpdate, WorkflowState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Tunables for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowPolicy {
    pub consensus: ConsensusPolicy,
    /// Confidence attached to every successful peer review
    pub review_confidence: f32,
    /// Upper bound on node executions per run
    pub max_steps: usize,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            consensus: ConsensusPolicy::default(),
            review_confidence: 0.8,
            max_steps: 32,
        }
    }
}

impl WorkflowPolicy {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if !(0.0..=1.0).contains(&self.review_confidence) {
            return Err(WorkflowError::InvalidPolicy(format!(
                "review confidence must be between 0.0 and 1.0, got {}",
                self.review_confidence
            )));
        }
        if self.max_steps == 0 {
            return Err(WorkflowError::InvalidPolicy(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a run starts from.
#[derive(Debug, Clone)]
pub enum WorkflowInput {
    Query(String),
    /// User messages; the first one is the query
    Transcript(Vec<String>),
}

impl WorkflowInput {
    fn into_state(self) -> WorkflowState {
        match self {
            WorkflowInput::Query(query) => {
                let mut state = WorkflowState::with_transcript(vec![Message::user(query.clone())]);
                state.original_query = Some(query);
                state
            }
            WorkflowInput::Transcript(messages) => {
                WorkflowState::with_transcript(messages.into_iter().map(Message::user).collect())
            }
        }
    }
}

/// Runs the multi-analyst workflow against a panel of analysts.
pub struct WorkflowEngine {
    panel: AnalystPanel,
    policy: WorkflowPolicy,
}

impl WorkflowEngine {
    pub fn new(panel: AnalystPanel, policy: WorkflowPolicy) -> Self {
        Self { panel, policy }
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// Execute the workflow to completion.
    pub async fn run(&self, input: WorkflowInput) -> Result<WorkflowState, WorkflowError> {
        self.policy.validate()?;

        let mut state = input.into_state();
        info!(run_id = %state.run_id, "Workflow started");

        let mut current = NextStep::Proceed(NodeId::Coordinator);
        let mut steps = 0usize;

        loop {
            current = match current {
                NextStep::Terminate => break,
                NextStep::FanOut(nodes) => {
                    steps += nodes.len();
                    self.check_budget(steps)?;
                    self.fan_out(&mut state, nodes).await?;
                    // Every sibling converges on the barrier.
                    NextStep::Proceed(NodeId::JoinBarrier)
                }
                NextStep::Proceed(node) => {
                    steps += 1;
                    self.check_budget(steps)?;
                    let (output, started_at) = self.execute(node, &state).await?;
                    self.commit(&mut state, node, started_at, output)?;
                    // No successor means the barrier is still waiting.
                    next_step(node, &state).unwrap_or(NextStep::Proceed(node))
                }
            };
        }

        state.complete();
        info!(
            run_id = %state.run_id,
            revisions = state.revision_count,
            duration_ms = state.duration_ms(),
            "Workflow finished"
        );
        Ok(state)
    }

    fn check_budget(&self, steps: usize) -> Result<(), WorkflowError> {
        if steps > self.policy.max_steps {
            return Err(WorkflowError::StepLimitExceeded {
                limit: self.policy.max_steps,
            });
        }
        Ok(())
    }

    async fn execute(
        &self,
        node: NodeId,
        state: &WorkflowState,
    ) -> Result<(NodeOutput, DateTime<Utc>), WorkflowError> {
        let started_at = Utc::now();
        debug!(node = %node, "Executing node");

        let output = match node {
            NodeId::Coordinator => coordinate(state)?,
            NodeId::JoinBarrier => wait_for_analyses(state).1,
            NodeId::PeerReview => {
                peer_review(state, &self.panel, self.policy.review_confidence).await
            }
            NodeId::Synthesis => synthesize(state, self.panel.senior.as_ref()).await,
            NodeId::ConsensusGate => check_consensus(state, &self.policy.consensus)?,
            NodeId::FundamentalAnalysis | NodeId::TechnicalAnalysis | NodeId::RiskAnalysis => {
                return Err(WorkflowError::DetachedNode(node));
            }
        };

        Ok((output, started_at))
    }

    /// Merge a node's update into the state and record the step.
    fn commit(
        &self,
        state: &mut WorkflowState,
        node: NodeId,
        started_at: DateTime<Utc>,
        output: NodeOutput,
    ) -> Result<(), WorkflowError> {
        let before = state.stage;
        state.apply(output.update)?;

        if state.stage != before {
            info!(from = %before, to = %state.stage, "Stage transition");
        }
        if output.success {
            debug!(node = %node, summary = %output.summary, "Node succeeded");
        } else {
            warn!(node = %node, summary = %output.summary, "Node fell back to substitute content");
        }

        state.record_step(node, started_at, output.success, output.summary);
        Ok(())
    }

    /// Run the analysis siblings concurrently over one snapshot and merge
    /// their updates.
    async fn fan_out(&self, state: &mut WorkflowState, nodes: [NodeId; 3]) -> Result<(), WorkflowError> {
        let before = state.stage;
        state.apply(StateUpdate::new().stage(Stage::AnalysesRunning))?;
        info!(from = %before, to = %state.stage, "Stage transition");

        let snapshot = Arc::new(state.clone());
        let started_at = Utc::now();
        let mut join_set: JoinSet<(NodeId, Result<NodeOutput, WorkflowError>)> = JoinSet::new();

        for node in nodes {
            let Some(role) = node.role() else {
                continue;
            };
            let analyst = self.panel.for_role(role);
            let snapshot = Arc::clone(&snapshot);

            join_set.spawn(async move {
                let output = run_analysis(role, &snapshot, analyst.as_ref()).await;
                (node, output)
            });
        }

        let mut outputs: Vec<(NodeId, NodeOutput)> = Vec::with_capacity(nodes.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((node, output)) => outputs.push((node, output?)),
                Err(e) => warn!(error = %e, "Analysis task aborted"),
            }
        }

        // An aborted task never reports; give its role a failure entry so the
        // barrier still sees every flag.
        for node in nodes {
            if outputs.iter().any(|(n, _)| *n == node) {
                continue;
            }
            if let Some(role) = node.role() {
                outputs.push((node, analysis_failure(role, "analysis task aborted")));
            }
        }

        let merged = StateUpdate::merge_concurrent(outputs.iter().map(|(_, o)| o.update.clone()))?;
        state.apply(merged)?;

        for (node, output) in outputs {
            state.record_step(node, started_at, output.success, output.summary);
        }
        Ok(())
    }

    /// Human-readable topology of the graph.
    pub fn describe(&self) -> String {
        let mut text = String::from("Workflow topology\n\n");
        let mut lines = vec![format!(
            "  {} -> [{} | {} | {}] (concurrent)",
            NodeId::Coordinator,
            NodeId::FundamentalAnalysis,
            NodeId::TechnicalAnalysis,
            NodeId::RiskAnalysis
        )];

        for role in Role::ANALYSTS {
            if let Some(analysis) = NodeId::analysis(role) {
                lines.push(format!(
                    "  {} -> {}   ({}, {:?} capabilities)",
                    analysis,
                    NodeId::JoinBarrier,
                    role.title(),
                    role.capability_set()
                ));
            }
        }

        lines.push(format!(
            "  {} -> {}   (once all three analysts report)",
            NodeId::JoinBarrier,
            NodeId::PeerReview
        ));
        lines.push(format!("  {} -> {}", NodeId::PeerReview, NodeId::Synthesis));
        lines.push(format!("  {} -> {}", NodeId::Synthesis, NodeId::ConsensusGate));
        lines.push(format!(
            "  {} -> END when consensus is reached, else {}",
            NodeId::ConsensusGate,
            NodeId::PeerReview
        ));

        text.push_str(&lines.join("\n"));
        text.push_str(&format!(
            "\n\nPolicy: max {} revisions, report must exceed {} chars, review confidence {:.2}, step limit {}\n",
            self.policy.consensus.max_revisions,
            self.policy.consensus.quality_threshold,
            self.policy.review_confidence,
            self.policy.max_steps
        ));
        text.push_str(&format!("Analysts: {:?}\n", self.panel));
        text
    }
}
