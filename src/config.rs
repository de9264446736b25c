//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.analyst-panel.toml` files.

use crate::analyst::OllamaConfig;
use crate::graph::WorkflowPolicy;
use crate::nodes::consensus::ConsensusPolicy;
use crate::report::ReportOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = ".analyst-panel.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Workflow settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "analyst_report.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Model turns per invocation that may end in tool calls.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Answer from the built-in offline analyst instead of a model server.
    #[serde(default)]
    pub offline: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            max_tool_rounds: default_max_tool_rounds(),
            offline: false,
        }
    }
}

fn default_model() -> String {
    "qwen2.5:14b".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout() -> u64 {
    300
}

fn default_max_tool_rounds() -> usize {
    6
}

/// Consensus and engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Revision rounds before the consensus gate forces termination.
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Report length in characters that must be exceeded to pass the gate.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: usize,

    /// Confidence recorded for each successful peer review.
    #[serde(default = "default_review_confidence")]
    pub review_confidence: f32,

    /// Node execution budget per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            quality_threshold: default_quality_threshold(),
            review_confidence: default_review_confidence(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_revisions() -> u32 {
    2
}

fn default_quality_threshold() -> usize {
    500
}

fn default_review_confidence() -> f32 {
    0.8
}

fn default_max_steps() -> usize {
    32
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the full run transcript.
    #[serde(default)]
    pub include_transcript: bool,

    /// Include the node execution timeline.
    #[serde(default = "default_true")]
    pub include_timeline: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_transcript: false,
            include_timeline: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via env) override
    /// the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(max_revisions) = args.max_revisions {
            self.workflow.max_revisions = max_revisions;
        }
        if let Some(threshold) = args.quality_threshold {
            self.workflow.quality_threshold = threshold;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        // Flags always override
        if args.offline {
            self.model.offline = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    pub fn workflow_policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            consensus: ConsensusPolicy {
                max_revisions: self.workflow.max_revisions,
                quality_threshold: self.workflow.quality_threshold,
            },
            review_confidence: self.workflow.review_confidence,
            max_steps: self.workflow.max_steps,
        }
    }

    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            ollama_url: self.model.ollama_url.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
            max_tool_rounds: self.model.max_tool_rounds,
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            include_transcript: self.report.include_transcript,
            include_timeline: self.report.include_timeline,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
