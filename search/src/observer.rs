//! Observable run events for progress displays and logs.

use tracing::{debug, info};

use crate::core::types::ControllerState;

/// Events emitted by the controller and the execution proxy, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    RunStarted {
        step_budget: usize,
        time_limit_secs: u64,
    },
    /// A step function invocation is about to start (1-indexed).
    StepStarted { step: usize },
    ExecutionStarted,
    ExecutionFinished,
    /// The step returned and its checkpoint was written.
    StepFinished { step: usize, journal_size: usize },
    RunFinished {
        state: ControllerState,
        journal_size: usize,
    },
}

/// Receiver of [`RunEvent`]s. Implemented for any `FnMut(&RunEvent)`.
pub trait RunObserver {
    fn on_event(&mut self, event: &RunEvent);
}

impl<F: FnMut(&RunEvent)> RunObserver for F {
    fn on_event(&mut self, event: &RunEvent) {
        self(event);
    }
}

/// Observer that reports progress through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    step_budget: usize,
}

impl TracingObserver {
    pub fn new(step_budget: usize) -> Self {
        Self { step_budget }
    }
}

impl RunObserver for TracingObserver {
    fn on_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                step_budget,
                time_limit_secs,
            } => info!(step_budget, time_limit_secs, "search started"),
            RunEvent::StepStarted { step } => debug!(step, "generating code"),
            RunEvent::ExecutionStarted => debug!("executing code"),
            RunEvent::ExecutionFinished => debug!("execution finished"),
            RunEvent::StepFinished { step, journal_size } => info!(
                step,
                "progress: {}/{} nodes", journal_size, self.step_budget
            ),
            RunEvent::RunFinished {
                state,
                journal_size,
            } => info!(%state, journal_size, "search finished"),
        }
    }
}
