//! Data models for the analyst panel.
//!
//! This module contains the core data structures shared by the workflow
//! engine, the nodes and the report renderers: roles, capability sets,
//! transcript messages, analysis entries and feedback records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A specialist role on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Financial statements, business model and valuation
    Fundamental,
    /// Price action, indicators and timing
    Technical,
    /// Market, credit and liquidity risk
    Risk,
    /// Investment director who synthesizes the panel's work
    Senior,
}

impl Role {
    /// The three roles that run in parallel and must all report before review.
    pub const ANALYSTS: [Role; 3] = [Role::Fundamental, Role::Technical, Role::Risk];

    /// Lowercase key used in completion flags and log tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Fundamental => "fundamental",
            Role::Technical => "technical",
            Role::Risk => "risk",
            Role::Senior => "senior",
        }
    }

    /// Human-readable analyst title.
    pub fn title(&self) -> &'static str {
        match self {
            Role::Fundamental => "Fundamental Analyst",
            Role::Technical => "Technical Analyst",
            Role::Risk => "Risk Analyst",
            Role::Senior => "Investment Director",
        }
    }

    /// Heading used for this role's formatted report.
    pub fn report_title(&self) -> &'static str {
        match self {
            Role::Fundamental => "Fundamental Analysis Report",
            Role::Technical => "Technical Analysis Report",
            Role::Risk => "Risk Assessment Report",
            Role::Senior => "Final Investment Report",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Role::Fundamental => "📊",
            Role::Technical => "📈",
            Role::Risk => "⚠️",
            Role::Senior => "🎯",
        }
    }

    /// Whether this role is one of the parallel analysts.
    pub fn is_analyst(&self) -> bool {
        !matches!(self, Role::Senior)
    }

    /// The fact-lookup operations this role may invoke.
    pub fn capability_set(&self) -> CapabilitySet {
        match self {
            Role::Fundamental | Role::Technical => CapabilitySet::Base,
            Role::Risk | Role::Senior => CapabilitySet::Extended,
        }
    }

    /// The two analyst roles whose work this role critiques during peer review.
    pub fn peers(&self) -> Vec<Role> {
        Role::ANALYSTS
            .into_iter()
            .filter(|r| r != self)
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single fact-lookup operation an analyst may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    StockData,
    FinancialNews,
    TechnicalIndicators,
    WebSearch,
    PortfolioOptimization,
    RiskAssessment,
}

impl Capability {
    /// Tool name exposed to the model.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Capability::StockData => "get_stock_data",
            Capability::FinancialNews => "get_financial_news",
            Capability::TechnicalIndicators => "technical_analysis",
            Capability::WebSearch => "web_search",
            Capability::PortfolioOptimization => "portfolio_optimization",
            Capability::RiskAssessment => "risk_assessment",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        CapabilitySet::Extended
            .capabilities()
            .iter()
            .copied()
            .find(|c| c.tool_name() == name)
    }
}

const BASE_CAPABILITIES: &[Capability] = &[
    Capability::StockData,
    Capability::FinancialNews,
    Capability::TechnicalIndicators,
    Capability::WebSearch,
];

const EXTENDED_CAPABILITIES: &[Capability] = &[
    Capability::StockData,
    Capability::FinancialNews,
    Capability::TechnicalIndicators,
    Capability::WebSearch,
    Capability::PortfolioOptimization,
    Capability::RiskAssessment,
];

/// The subset of fact-lookup operations granted to an analyst invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilitySet {
    /// Market data, news, indicators and web search
    Base,
    /// Base plus portfolio optimization and risk assessment
    Extended,
}

impl CapabilitySet {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            CapabilitySet::Base => BASE_CAPABILITIES,
            CapabilitySet::Extended => EXTENDED_CAPABILITIES,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Advisory workflow stage, used for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    Coordinating,
    AnalysesRunning,
    AnalysesJoined,
    Reviewing,
    Synthesizing,
    ConsensusChecked,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Coordinating => "coordinating",
            Stage::AnalysesRunning => "analyses_running",
            Stage::AnalysesJoined => "analyses_joined",
            Stage::Reviewing => "reviewing",
            Stage::Synthesizing => "synthesizing",
            Stage::ConsensusChecked => "consensus_checked",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Identifier of a node in the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Coordinator,
    FundamentalAnalysis,
    TechnicalAnalysis,
    RiskAnalysis,
    JoinBarrier,
    PeerReview,
    Synthesis,
    ConsensusGate,
}

impl NodeId {
    /// The analysis node run for an analyst role.
    pub fn analysis(role: Role) -> Option<Self> {
        match role {
            Role::Fundamental => Some(NodeId::FundamentalAnalysis),
            Role::Technical => Some(NodeId::TechnicalAnalysis),
            Role::Risk => Some(NodeId::RiskAnalysis),
            Role::Senior => None,
        }
    }

    /// The role an analysis node runs for.
    pub fn role(&self) -> Option<Role> {
        match self {
            NodeId::FundamentalAnalysis => Some(Role::Fundamental),
            NodeId::TechnicalAnalysis => Some(Role::Technical),
            NodeId::RiskAnalysis => Some(Role::Risk),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeId::Coordinator => "coordinator",
            NodeId::FundamentalAnalysis => "fundamental_analysis",
            NodeId::TechnicalAnalysis => "technical_analysis",
            NodeId::RiskAnalysis => "risk_analysis",
            NodeId::JoinBarrier => "join_barrier",
            NodeId::PeerReview => "peer_review",
            NodeId::Synthesis => "synthesis",
            NodeId::ConsensusGate => "consensus_gate",
        };
        write!(f, "{}", name)
    }
}

/// Who posted a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Coordinator,
    Analyst(Role),
    PeerReview,
    System,
}

/// A formatted message in the run transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub author: Author,
    pub content: String,
}

impl Message {
    pub fn new(author: Author, content: impl Into<String>) -> Self {
        Self {
            author,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Author::User, content)
    }

    pub fn is_user(&self) -> bool {
        matches!(self.author, Author::User)
    }
}

/// A role-tagged entry in the analysis log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    /// Role that produced the entry.
    pub role: Role,
    /// Analysis text, or the failure description.
    pub text: String,
    /// Whether the analyst invocation failed.
    pub failed: bool,
}

impl AnalysisEntry {
    pub fn completed(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            failed: false,
        }
    }

    /// Fallback entry recorded when the analyst invocation fails.
    pub fn failed(role: Role, error: impl fmt::Display) -> Self {
        Self {
            role,
            text: format!("analysis failed - {}", error),
            failed: true,
        }
    }
}

impl fmt::Display for AnalysisEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.text)
    }
}

/// Default improvement when a review names none.
pub const DEFAULT_IMPROVEMENT: &str = "Refine the analysis based on peer review feedback";

/// Peer review outcome for one reviewing role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Reviewing role.
    pub source_role: Role,
    /// Full review text (or the failure placeholder).
    pub feedback_text: String,
    /// Reviewer confidence in [0, 1].
    pub confidence_score: f32,
    /// Concrete improvements suggested by the reviewer.
    pub suggested_improvements: Vec<String>,
    /// True when this record stands in for a review that failed.
    #[serde(default)]
    pub failed: bool,
}

impl FeedbackRecord {
    pub fn new(
        source_role: Role,
        feedback_text: impl Into<String>,
        confidence_score: f32,
        suggested_improvements: Vec<String>,
    ) -> Self {
        Self {
            source_role,
            feedback_text: feedback_text.into(),
            confidence_score: confidence_score.clamp(0.0, 1.0),
            suggested_improvements,
            failed: false,
        }
    }

    /// Fallback record substituted for a failed review.
    pub fn placeholder(source_role: Role) -> Self {
        Self {
            failed: true,
            ..Self::new(
                source_role,
                format!("[{} review] Review failed", source_role.title()),
                0.0,
                Vec::new(),
            )
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.failed
    }
}
