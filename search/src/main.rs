//! `tree-search`: run a bounded solution tree search, or inspect a snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tree_search::core::types::RunStop;
use tree_search::exit_codes;
use tree_search::io::agent::CommandAgent;
use tree_search::io::checkpoint::load_journal;
use tree_search::io::config::load_config;
use tree_search::io::interpreter::ProcessInterpreter;
use tree_search::logging;
use tree_search::observer::TracingObserver;
use tree_search::render::{journal_to_string_tree, journal_to_styled_tree};
use tree_search::run::run_experiment;

#[derive(Parser)]
#[command(
    name = "tree-search",
    version,
    about = "Time- and step-bounded solution tree search"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an experiment until the step or time budget is used up.
    Run {
        /// Experiment config (TOML). Defaults are used if the file is missing.
        #[arg(short, long, default_value = "search.toml")]
        config: PathBuf,
        /// Override `exp_name`.
        #[arg(long)]
        exp_name: Option<String>,
        /// Override `agent.steps`.
        #[arg(long)]
        steps: Option<usize>,
        /// Override `agent.time_limit_secs`.
        #[arg(long)]
        time_limit: Option<u64>,
    },
    /// Print the solution tree stored in a journal snapshot.
    Show {
        /// Path to `journal.json`.
        snapshot: PathBuf,
        /// Print the flat indented form instead of the styled tree.
        #[arg(long)]
        plain: bool,
    },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            exp_name,
            steps,
            time_limit,
        } => cmd_run(config, exp_name, steps, time_limit),
        Command::Show { snapshot, plain } => cmd_show(snapshot, plain),
    }
}

fn cmd_run(
    config: PathBuf,
    exp_name: Option<String>,
    steps: Option<usize>,
    time_limit: Option<u64>,
) -> Result<i32> {
    let mut cfg = load_config(&config)?;
    if let Some(exp_name) = exp_name {
        cfg.exp_name = exp_name;
    }
    if let Some(steps) = steps {
        cfg.agent.steps = steps;
    }
    if let Some(time_limit) = time_limit {
        cfg.agent.time_limit_secs = time_limit;
    }
    cfg.validate().context("invalid config overrides")?;
    logging::init(&cfg.log_level);

    let agent = CommandAgent::new(cfg.workspace_dir.clone(), &cfg.agent);
    let interpreter = ProcessInterpreter::new(cfg.workspace_dir.clone(), &cfg.exec);
    let mut observer = TracingObserver::new(cfg.agent.steps);
    let report = run_experiment(&cfg, agent, interpreter, &mut observer)?;

    info!(
        journal = %cfg.log_dir.join("journal.json").display(),
        nodes = report.outcome.journal_size,
        "run artifacts saved"
    );
    if report.outcome.stop == RunStop::Completed {
        print!("{}", journal_to_styled_tree(&report.journal));
    }
    Ok(exit_codes::OK)
}

fn cmd_show(snapshot: PathBuf, plain: bool) -> Result<i32> {
    logging::init("warn");
    let journal = load_journal(&snapshot)?;
    if plain {
        print!("{}", journal_to_string_tree(&journal));
    } else {
        print!("{}", journal_to_styled_tree(&journal));
    }
    Ok(exit_codes::OK)
}
