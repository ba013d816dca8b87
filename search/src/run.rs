//! End-to-end assembly of a search experiment from its config.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::controller::{RunOutcome, SearchController};
use crate::core::journal::Journal;
use crate::io::agent::StepAgent;
use crate::io::checkpoint::JournalStore;
use crate::io::config::{SearchConfig, write_config};
use crate::io::interpreter::Interpreter;
use crate::io::workspace::{RunScope, prepare_workspace};
use crate::observer::RunObserver;

/// What a finished (completed or timed out) experiment leaves behind.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Final journal, as checkpointed.
    pub journal: Journal,
}

/// Run one experiment with the given collaborators.
///
/// Prepares the workspace, stores a copy of the config next to the
/// checkpoints, and runs the controller inside a [`RunScope`] so the workspace
/// is removed if the run ends without recording a single node.
#[instrument(skip_all, fields(exp_name = %cfg.exp_name))]
pub fn run_experiment<A, I, O>(
    cfg: &SearchConfig,
    agent: A,
    interpreter: I,
    observer: &mut O,
) -> Result<RunReport>
where
    A: StepAgent,
    I: Interpreter,
    O: RunObserver,
{
    cfg.validate()?;
    info!("Starting run \"{}\"", cfg.exp_name);

    prepare_workspace(&cfg.workspace_dir, cfg.data_dir.as_deref())
        .context("prepare workspace")?;
    let mut scope = RunScope::new(&cfg.workspace_dir);

    let store = JournalStore::new(&cfg.log_dir);
    write_config(&store.log_dir().join("config.toml"), cfg).context("save run config")?;

    let mut controller = SearchController::new(cfg.budget(), agent, interpreter, store);
    let outcome = controller.run(scope.journal_mut(), observer)?;
    Ok(RunReport {
        outcome,
        journal: scope.journal().clone(),
    })
}
