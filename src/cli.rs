//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation.

use clap::Parser;
use std::path::PathBuf;

/// analyst-panel - multi-analyst investment review on local models
///
/// Three specialist analysts (fundamental, technical, risk) study the
/// query in parallel, review each other's work, and an investment
/// director consolidates the result into a final report.
///
/// Examples:
///   analyst-panel "Evaluate Company X"
///   analyst-panel "Evaluate Company X" --model llama3.1:8b --format json
///   analyst-panel --message "Evaluate Company X" --message "Focus on margins"
///   analyst-panel "Evaluate Company X" --offline
///   analyst-panel --dry-run
///   analyst-panel --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Question or security to analyze
    #[arg(value_name = "QUERY", conflicts_with = "message")]
    pub query: Option<String>,

    /// Transcript message; repeat for several, the first is the query
    #[arg(long, value_name = "TEXT")]
    pub message: Vec<String>,

    /// Ollama model used by every analyst
    ///
    /// Can also be set via ANALYST_PANEL_MODEL or .analyst-panel.toml.
    #[arg(short, long, env = "ANALYST_PANEL_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .analyst-panel.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Revision rounds allowed before the consensus gate stops the run
    #[arg(long, value_name = "COUNT")]
    pub max_revisions: Option<u32>,

    /// Report length in characters that ends the run without revision
    #[arg(long, value_name = "CHARS")]
    pub quality_threshold: Option<usize>,

    /// Use the built-in offline analyst instead of a model server
    #[arg(long)]
    pub offline: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: print the workflow topology without calling any analyst
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .analyst-panel.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether a query or transcript was supplied.
    pub fn has_input(&self) -> bool {
        self.query.is_some() || !self.message.is_empty()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if !self.dry_run {
            if !self.has_input() {
                return Err("A query or at least one --message is required".to_string());
            }
            let first = self
                .query
                .as_deref()
                .or_else(|| self.message.first().map(String::as_str))
                .unwrap_or("");
            if first.trim().is_empty() {
                return Err("The query must not be empty".to_string());
            }
        }

        // Validate Ollama URL format (not needed offline)
        if !self.offline {
            if let Some(ref url) = self.ollama_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        // Validate temperature range
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
