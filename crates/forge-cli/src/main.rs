//! Forge CLI - run blueprint plans under resource locks

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use forge_core::agents::{CommandAgent, CommandReviewOracle, CommandRunner};
use forge_core::config::Config;
use forge_core::domain::blueprint::ExecutionPlan;
use forge_core::domain::locking::LockManager;
use forge_core::scheduler::{GateMode, LayerScheduler, RunReport, TaskStatus};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about = "Run blueprint plans under resource locks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan layer by layer
    Run {
        /// Path to the plan file (JSON)
        plan: PathBuf,
        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Check a plan file without running it
    Validate {
        /// Path to the plan file (JSON)
        plan: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Command-line overrides for a single run
#[derive(clap::Args, Debug, Default, Clone)]
struct RunOverrides {
    /// Agent command line (overrides agent.command)
    #[arg(long)]
    agent_cmd: Option<String>,
    /// Review oracle command line (overrides review.command)
    #[arg(long)]
    review_cmd: Option<String>,
    /// Run each batch's tasks one after another
    #[arg(long)]
    sequential: bool,
    /// Tasks per batch
    #[arg(long)]
    max_concurrency: Option<usize>,
    /// Skip pre-validation of specifications
    #[arg(long)]
    no_pre_validate: bool,
    /// Skip post-verification of results
    #[arg(long)]
    no_post_verify: bool,
    /// Reject tasks the review oracle does not approve
    #[arg(long)]
    blocking_gates: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("forge=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { plan, overrides } => cmd_run(&plan, overrides, cli.format, cli.quiet).await,
        Commands::Validate { plan } => cmd_validate(&plan, cli.format, cli.quiet),
        Commands::Config { action } => cmd_config(action, cli.format, cli.quiet),
    }
}

/// Fold command-line overrides into the loaded configuration
fn apply_overrides(config: &mut Config, overrides: &RunOverrides) -> anyhow::Result<()> {
    if let Some(command) = &overrides.agent_cmd {
        config.set("agent.command", command)?;
    }
    if let Some(command) = &overrides.review_cmd {
        config.set("review.command", command)?;
    }
    if let Some(max) = overrides.max_concurrency {
        config.set("scheduler.max_concurrency", &max.to_string())?;
    }
    if overrides.sequential {
        config.scheduler.parallel = false;
    }
    if overrides.no_pre_validate {
        config.scheduler.pre_validate = false;
    }
    if overrides.no_post_verify {
        config.scheduler.post_verify = false;
    }
    if overrides.blocking_gates {
        config.scheduler.gate_mode = GateMode::Blocking;
    }
    Ok(())
}

/// Attach the error code and suggested next step to a core error
fn with_hint(err: forge_core::Error) -> anyhow::Error {
    match err.suggestion() {
        Some(hint) => anyhow!("[{}] {}\n  hint: {}", err.code(), err, hint),
        None => anyhow!("[{}] {}", err.code(), err),
    }
}

fn build_scheduler(config: &Config, session_id: &str) -> anyhow::Result<LayerScheduler> {
    let agent_runner: CommandRunner = config.agent_runner()?.ok_or_else(|| {
        anyhow!(
            "No agent command configured. Pass --agent-cmd or run \
             `forge config set agent.command <cmd>`."
        )
    })?;
    let agent = CommandAgent::new(agent_runner, session_id);

    let locks = LockManager::new(config.lock_config());
    let mut scheduler = LayerScheduler::new(config.scheduler_config(), locks, Arc::new(agent));

    match config.review_runner()? {
        Some(runner) => {
            debug!(program = runner.program(), "Using review oracle");
            scheduler = scheduler.with_review_oracle(Arc::new(CommandReviewOracle::new(runner)));
        }
        None => info!("No review command configured, review gates are skipped"),
    }
    Ok(scheduler)
}

async fn cmd_run(
    plan_path: &Path,
    overrides: RunOverrides,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &overrides)?;

    let plan = ExecutionPlan::load(plan_path)
        .map_err(with_hint)
        .with_context(|| format!("Failed to load plan: {}", plan_path.display()))?;
    let scheduler = build_scheduler(&config, &plan.session_id)?;

    let report = scheduler.run(&plan).await.map_err(with_hint)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text if !quiet => print!("{}", render_report(&report)),
        OutputFormat::Text => {}
    }

    if report.is_success() {
        Ok(())
    } else {
        let total = report.tasks().count();
        Err(anyhow!(
            "{} of {} tasks did not succeed",
            total - report.count(TaskStatus::Succeeded),
            total
        ))
    }
}

fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    let elapsed = report.finished_at - report.started_at;
    out.push_str(&format!("Session {}\n", report.session_id));

    for layer in &report.layers {
        out.push_str(&format!("Layer {}\n", layer.index));
        for batch in &layer.batches {
            out.push_str(&format!("  Batch {}\n", batch.index));
            for task in &batch.tasks {
                out.push_str(&format!(
                    "    {:<10} {} ({} ms)\n",
                    task.status.as_str(),
                    task.task_id,
                    task.duration_ms
                ));
                if let Some(error) = &task.error {
                    out.push_str(&format!("      error: {}\n", error));
                }
                for warning in &task.warnings {
                    out.push_str(&format!("      warning: {}\n", warning));
                }
            }
            for conflict in &batch.cross_reference.conflicts {
                out.push_str(&format!(
                    "    conflict: {} claimed by {}\n",
                    conflict.path,
                    conflict.tasks.join(", ")
                ));
            }
            for warning in &batch.cross_reference.warnings {
                out.push_str(&format!("    warning: {}\n", warning));
            }
        }
    }

    out.push_str(&format!(
        "\n{} succeeded, {} failed, {} timed out, {} rejected in {:.1}s\n",
        report.count(TaskStatus::Succeeded),
        report.count(TaskStatus::Failed),
        report.count(TaskStatus::TimedOut),
        report.count(TaskStatus::Rejected),
        Duration::from_millis(elapsed.num_milliseconds().max(0) as u64).as_secs_f64()
    ));
    out
}

fn cmd_validate(plan_path: &Path, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let plan = ExecutionPlan::load(plan_path)
        .map_err(with_hint)
        .with_context(|| format!("Invalid plan: {}", plan_path.display()))?;

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "valid": true,
                "sessionId": plan.session_id,
                "layers": plan.layers.len(),
                "tasks": plan.task_count(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text if !quiet => {
            println!(
                "Plan is valid: {} tasks in {} layers",
                plan.task_count(),
                plan.layers.len()
            );
            for (index, layer) in plan.layers.iter().enumerate() {
                println!("  Layer {}: {}", index, layer.join(", "));
            }
        }
        OutputFormat::Text => {}
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (key, value) in items {
                    println!("{} = {}", key, value);
                }
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod main_tests;
