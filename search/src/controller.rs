//! Time- and step-bounded search loop.
//!
//! The controller arms a [`DeadlineGuard`], invokes the step function until the
//! journal holds `steps` nodes, and checkpoints after every step. However the
//! loop ends (budget reached, deadline, or step failure) the deadline is
//! disarmed and one final checkpoint is written.

use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::cancel::{CancelToken, DeadlineExceeded, is_deadline_exceeded};
use crate::core::journal::Journal;
use crate::core::types::{ControllerState, RunStop};
use crate::exec_proxy::ExecProxy;
use crate::io::agent::StepAgent;
use crate::io::checkpoint::JournalStore;
use crate::io::deadline::DeadlineGuard;
use crate::io::interpreter::Interpreter;
use crate::observer::{RunEvent, RunObserver};
use crate::render::journal_to_string_tree;

/// Limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBudget {
    /// Stop once the journal holds this many nodes.
    pub steps: usize,
    /// Wall-clock limit for the whole loop.
    pub time_limit: Duration,
}

/// Summary of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub stop: RunStop,
    /// Number of step function invocations, including an interrupted one.
    pub steps_invoked: usize,
    pub journal_size: usize,
}

/// Drives a [`StepAgent`] over a journal. Runs at most once.
pub struct SearchController<A, I> {
    budget: SearchBudget,
    agent: A,
    interpreter: I,
    store: JournalStore,
    state: ControllerState,
}

impl<A: StepAgent, I: Interpreter> SearchController<A, I> {
    pub fn new(budget: SearchBudget, agent: A, interpreter: I, store: JournalStore) -> Self {
        Self {
            budget,
            agent,
            interpreter,
            store,
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn store(&self) -> &JournalStore {
        &self.store
    }

    /// Run the search loop over `journal`.
    ///
    /// Returns `Ok` for [`RunStop::Completed`] and [`RunStop::TimedOut`]. A step
    /// failure is returned unchanged after the final checkpoint was attempted;
    /// a failing final checkpoint never replaces it.
    #[instrument(
        skip_all,
        fields(steps = self.budget.steps, time_limit_secs = self.budget.time_limit.as_secs())
    )]
    pub fn run<O: RunObserver>(
        &mut self,
        journal: &mut Journal,
        observer: &mut O,
    ) -> Result<RunOutcome> {
        if self.state != ControllerState::Idle {
            return Err(anyhow!(
                "search controller already ran (state: {})",
                self.state
            ));
        }

        let cancel = CancelToken::new();
        let mut deadline = DeadlineGuard::arm(self.budget.time_limit, cancel.clone())?;
        self.state = ControllerState::Running;
        observer.on_event(&RunEvent::RunStarted {
            step_budget: self.budget.steps,
            time_limit_secs: self.budget.time_limit.as_secs(),
        });

        let mut steps_invoked = 0usize;
        let looped = self.drive(journal, &cancel, observer, &mut steps_invoked);
        deadline.disarm();

        // Single recovery point for the deadline.
        let looped = match looped {
            Err(err) if is_deadline_exceeded(&err) => {
                info!(nodes = journal.len(), "Execution timed out");
                Ok(RunStop::TimedOut)
            }
            other => other,
        };

        if let Err(err) = self.interpreter.cleanup_session() {
            warn!(err = %format!("{err:#}"), "interpreter cleanup failed");
        }

        let checkpoint = self.store.persist(journal);
        let result = match (looped, checkpoint) {
            (Ok(stop), Ok(())) => Ok(stop),
            (Ok(_), Err(err)) => Err(err.context("write final checkpoint")),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(checkpoint_err)) => {
                warn!(err = %format!("{checkpoint_err:#}"), "final checkpoint failed");
                Err(err)
            }
        };

        self.state = match &result {
            Ok(stop) => (*stop).into(),
            Err(_) => ControllerState::Failed,
        };
        observer.on_event(&RunEvent::RunFinished {
            state: self.state,
            journal_size: journal.len(),
        });

        let stop = result?;
        if stop == RunStop::Completed {
            info!("\n{}", journal_to_string_tree(journal));
        }
        Ok(RunOutcome {
            stop,
            steps_invoked,
            journal_size: journal.len(),
        })
    }

    fn drive<O: RunObserver>(
        &mut self,
        journal: &mut Journal,
        cancel: &CancelToken,
        observer: &mut O,
        steps_invoked: &mut usize,
    ) -> Result<RunStop> {
        while journal.len() < self.budget.steps {
            cancel.check()?;
            *steps_invoked += 1;
            let step = *steps_invoked;
            observer.on_event(&RunEvent::StepStarted { step });

            let stepped = {
                let mut exec = ExecProxy::new(&mut self.interpreter, observer, cancel);
                self.agent.step(journal, &mut exec, cancel)
            };
            if let Err(err) = stepped {
                if cancel.is_cancelled() && !is_deadline_exceeded(&err) {
                    // The deadline fired while the step was failing; the
                    // interruption takes precedence over whatever it reported.
                    debug!(err = %format!("{err:#}"), "step failed after the deadline fired");
                    return Err(err.context(DeadlineExceeded));
                }
                return Err(err);
            }

            self.store.persist(journal)?;
            debug!(step, nodes = journal.len(), "checkpoint written");
            observer.on_event(&RunEvent::StepFinished {
                step,
                journal_size: journal.len(),
            });
        }
        Ok(RunStop::Completed)
    }
}
