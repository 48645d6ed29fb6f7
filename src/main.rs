//! CLI entry point for the `zentara` agent engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenvy::dotenv;

use zentara_agent::config::Config;
use zentara_agent::core::block::ToolUse;
use zentara_agent::logging;
use zentara_agent::replay::{self, ReplayConfig, ReplayHarness, ReplayRun, ReplayScenario};
use zentara_agent::tools::describe;
use zentara_agent::tools::fetch_description::FetchToolDescriptionTool;

mod console;

use crate::console::ConsoleHost;

#[derive(Parser, Debug)]
#[command(
    name = "zentara",
    author,
    version,
    about = "Zentara - streaming presentation and tool-dispatch engine",
    long_about = "Replays recorded model turns through the Zentara tool engine and inspects the tool catalog."
)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile name
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Feed a recorded turn (JSON stream events) through the engine
    Replay {
        /// Scenario file
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Approve every prompt without asking
        #[arg(short, long)]
        yes: bool,
        /// Answer prompts from the scenario's `replies` instead of stdin
        #[arg(long, conflicts_with = "yes")]
        scripted: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available tools, or show one tool's documentation
    Tools {
        /// Tool name; omit to list every tool
        #[arg(value_name = "NAME")]
        name: Option<String>,
        /// Page of the listing (1-based)
        #[arg(short, long)]
        page: Option<u64>,
    },
    /// Print the label shown for a tool-use block given as JSON
    Describe {
        /// e.g. '{"name": "read_file", "params": {"path": "src/main.rs"}}'
        #[arg(value_name = "JSON")]
        block: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(cli.config.clone(), cli.profile.as_deref())?;
    match cli.command {
        Commands::Replay {
            file,
            yes,
            scripted,
            json,
        } => run_replay(&config, &file, yes, scripted, json).await,
        Commands::Tools { name, page } => run_tools(&config, name.as_deref(), page),
        Commands::Describe { block } => run_describe(&block),
    }
}

async fn run_replay(
    config: &Config,
    file: &Path,
    yes: bool,
    scripted: bool,
    json: bool,
) -> Result<()> {
    let scenario = ReplayScenario::load(file)?;
    let harness = ReplayHarness::new(ReplayConfig::from(config));
    let run = if scripted {
        let host = replay::ScriptedHost::new(scenario.replies.clone())
            .with_turn_log(config.turn_log_path());
        harness.run(&scenario, Arc::new(host)).await?
    } else {
        let host = ConsoleHost::new(yes || config.auto_approve(), config.turn_log_path());
        harness.run(&scenario, Arc::new(host)).await?
    };

    if json {
        let report = replay::report_json(&run);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&run);
    }
    Ok(())
}

fn print_report(run: &ReplayRun) {
    println!();
    println!("{}", format!("Replay: {}", run.scenario_name).bold());
    println!("{}", "==================".dimmed());
    let status = if run.success() {
        "✓ success".green()
    } else {
        "✗ failed".red()
    };
    println!("  {status}  blocks={} tool_errors={}", run.blocks, run.tool_errors());
    println!("  duration: {:?}", run.duration);
    if run.rejected_tool {
        println!("  {}", "a tool was denied; the rest of the turn was skipped".yellow());
    }
    if run.mistake_limit_reached {
        println!(
            "  {}",
            format!("consecutive mistake limit reached ({})", run.consecutive_mistakes).yellow()
        );
    }

    println!();
    println!("{}", "Tool usage:".bold());
    if run.usage.is_empty() {
        println!("  {} no tools dispatched", "·".dimmed());
    }
    for (tool, usage) in &run.usage {
        println!(
            "  {tool}: attempts={} failures={}",
            usage.attempts, usage.failures
        );
    }

    println!();
    println!("{}", "Result buffer:".bold());
    println!("{}", run.result_text());
}

fn run_tools(config: &Config, name: Option<&str>, page: Option<u64>) -> Result<()> {
    let page_size = config.tool_list_page_size();
    let registry = replay::replay_registry(&BTreeMap::new(), page_size);
    let fetch = FetchToolDescriptionTool::new(Arc::new(registry.catalog().clone()), page_size);
    let text = fetch.lookup(name.unwrap_or("list"), page)?;
    println!("{text}");
    Ok(())
}

fn run_describe(raw: &str) -> Result<()> {
    let block: ToolUse = serde_json::from_str(raw).context("Invalid tool-use JSON")?;
    println!("{}", describe(&block));
    Ok(())
}
