//! Goal-directed refinement CLI.
//!
//! Reads `refiner.toml`, runs generate/evaluate cycles against the configured
//! collaborator commands until enough candidates meet the minimum score, and
//! prints the best candidates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use refiner::core::creative::CreativeSelector;
use refiner::exit_codes;
use refiner::io::collaborator::Collaborators;
use refiner::io::command::{CommandEvaluator, CommandGenerator};
use refiner::io::config::{DEFAULT_CONFIG_PATH, load_config, sample_config, write_config};
use refiner::logging;
use refiner::refine::run_refinement;

#[derive(Parser)]
#[command(
    name = "refiner",
    version,
    about = "Goal-directed iterative refinement with a weighted focus group"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a sample config if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Load and validate the config.
    Validate {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Run refinement until the goal holds or a bound is reached.
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    logging::init();
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force, config } => cmd_init(&config, force),
        Command::Validate { config } => cmd_validate(&config),
        Command::Run { config } => cmd_run(&config).await,
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        println!("init: {} exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &sample_config()).with_context(|| format!("write {}", path.display()))?;
    println!("init: wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let cfg = load_config(path)?;
    let settings = cfg.settings()?;
    println!(
        "validate: ok raters={} creatives={} capacity={}",
        settings.panel.len(),
        cfg.creatives.len(),
        settings.store_capacity()
    );
    Ok(exit_codes::OK)
}

async fn cmd_run(path: &Path) -> Result<i32> {
    let cfg = load_config(path)?;
    let settings = cfg.settings()?;
    let selector = CreativeSelector::new(
        cfg.creatives.clone(),
        cfg.selection.strategy,
        cfg.selection.seed,
    )?;
    let generator = CommandGenerator::new(
        cfg.generator.command.clone(),
        selector,
        cfg.output_limit_bytes,
    )?;
    let evaluator = CommandEvaluator::new(cfg.evaluator.command.clone(), cfg.output_limit_bytes)?;
    let collaborators = Collaborators::new(
        Arc::new(generator),
        Arc::new(evaluator),
        cfg.call_timeout(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    info!(config = %path.display(), "starting refinement");
    let required_count = settings.required_count;
    let outcome = run_refinement(
        settings,
        cfg.max_planner_steps,
        &collaborators,
        &cancel,
        |report, state| {
            eprintln!(
                "step: n={} action={:?} iteration={} stored={} accepted={}",
                report.step,
                report.action,
                state.iteration,
                state.best.len(),
                state.accepted().len()
            );
        },
    )
    .await?;

    let code = exit_codes::for_outcome(&outcome);
    println!(
        "result: stop={:?} steps={} iterations={} accepted={}/{}{}",
        outcome.stop,
        outcome.steps_executed,
        outcome.state.iteration,
        outcome.state.accepted().len(),
        required_count,
        if code == exit_codes::EXHAUSTED {
            " (best effort: iteration budget exhausted)"
        } else {
            ""
        }
    );
    let shown = outcome.state.best.show(required_count);
    if !shown.is_empty() {
        println!("{shown}");
    }
    Ok(code)
}
