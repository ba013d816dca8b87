//! Shared types passed between the controller and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of running one piece of generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Combined stdout and stderr (possibly truncated).
    pub term_out: String,
    /// Process exit code; `None` when killed by a signal.
    pub exit_code: Option<i32>,
    pub exec_time_ms: u64,
    /// The per-execution timeout fired and the process was killed.
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Lifecycle of a search controller. Terminal states are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Running,
    Completed,
    TimedOut,
    Failed,
}

impl ControllerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Failed)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why a run that did not fail stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStop {
    /// The journal reached the step budget.
    Completed,
    /// The time budget elapsed first.
    TimedOut,
}

impl From<RunStop> for ControllerState {
    fn from(stop: RunStop) -> Self {
        match stop {
            RunStop::Completed => Self::Completed,
            RunStop::TimedOut => Self::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stopped_states_are_terminal() {
        assert!(!ControllerState::Idle.is_terminal());
        assert!(!ControllerState::Running.is_terminal());
        for stop in [RunStop::Completed, RunStop::TimedOut] {
            assert!(ControllerState::from(stop).is_terminal());
        }
        assert!(ControllerState::Failed.is_terminal());
    }
}
