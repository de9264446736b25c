//! analyst-panel - multi-analyst investment review
//!
//! A CLI tool that runs three specialist analysts concurrently on a local
//! Ollama model, has them review each other, and consolidates their work
//! into a final report under a bounded revision loop.
//!
//! Exit codes:
//!   0 - Success (the workflow reached a terminal state)
//!   1 - Runtime error (configuration, missing query, step limit, etc.)

mod analyst;
mod cli;
mod config;
mod errors;
mod graph;
mod models;
mod nodes;
mod report;
mod state;

use analyst::{Analyst, AnalystPanel, OfflineAnalyst, OllamaAnalyst};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use graph::{WorkflowEngine, WorkflowInput};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args)?;

    info!("analyst-panel v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_panel(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Workflow failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, revision policy, and report sections.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the workflow end to end. Returns the exit code.
async fn run_panel(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let panel = build_panel(&config)?;
    let engine = WorkflowEngine::new(panel, config.workflow_policy());

    // Handle --dry-run: show the graph and exit
    if args.dry_run {
        println!("\n🔍 Dry run: no analyst will be called\n");
        println!("{}", engine.describe());
        return Ok(0);
    }

    let input = match args.query.clone() {
        Some(query) => WorkflowInput::Query(query),
        None => WorkflowInput::Transcript(args.message.clone()),
    };

    if !args.quiet {
        println!("🤖 Starting analyst panel...");
        if config.model.offline {
            println!("   Analysts: offline");
        } else {
            println!("   Model: {}", config.model.name);
            println!("   Ollama: {}", config.model.ollama_url);
            println!("   Timeout: {}s", config.model.timeout_seconds);
        }
        let policy = engine.policy();
        println!(
            "   Revisions: up to {} (report must exceed {} chars)\n",
            policy.consensus.max_revisions, policy.consensus.quality_threshold
        );
    }

    let spinner = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        pb.set_message("Analysts at work...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let result = engine.run(input).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let state = result.context("Workflow did not reach a terminal state")?;

    if !args.quiet {
        if let Some(ref report) = state.final_report {
            println!("{}", report::format_final_report(report));
        }
    }

    // Render and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&state)?,
        OutputFormat::Markdown => report::generate_markdown_report(&state, config.report_options()),
    };
    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&output, &output_path)?;

    let failed = state.analysis_log.iter().filter(|e| e.failed).count();
    let failed_reviews = state
        .feedback_artifacts
        .iter()
        .filter(|r| r.is_placeholder())
        .count();
    if failed > 0 || failed_reviews > 0 {
        warn!(
            "{} analyses and {} reviews fell back to substitute content",
            failed, failed_reviews
        );
    }

    println!("\n📊 Run Summary:");
    println!("   Run: {}", state.run_id);
    println!(
        "   Analyses: {} ({} failed)",
        state.analysis_log.len(),
        failed
    );
    println!(
        "   Reviews: {} ({} failed)",
        state.feedback_artifacts.len(),
        failed_reviews
    );
    println!("   Revisions: {}", state.revision_count);
    println!("   Duration: {:.1}s", state.duration_ms() as f64 / 1000.0);
    println!("\n✅ Review complete! Report saved to: {}", output_path.display());

    Ok(0)
}

/// One shared analyst client serves every role.
fn build_panel(config: &Config) -> Result<AnalystPanel> {
    let analyst: Arc<dyn Analyst> = if config.model.offline {
        info!("Using the offline analyst");
        Arc::new(OfflineAnalyst::new())
    } else {
        let client = OllamaAnalyst::new(config.ollama_config())
            .context("Failed to create the Ollama client")?;
        Arc::new(client)
    };
    debug!("Analyst backend: {}", analyst.name());

    Ok(AnalystPanel::uniform(analyst))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
