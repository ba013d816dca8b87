//! Test-only scripted collaborators and fixtures.

use std::collections::VecDeque;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use crate::core::cancel::{CancelToken, DeadlineExceeded};
use crate::core::classifier::classify_execution;
use crate::core::journal::{Journal, NodeId};
use crate::core::types::ExecutionResult;
use crate::exec_proxy::ExecCallback;
use crate::io::agent::StepAgent;
use crate::io::config::SearchConfig;
use crate::io::interpreter::Interpreter;

/// One scripted step function invocation.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Insert a node without executing anything.
    Insert {
        parent: Option<usize>,
        is_buggy: bool,
        metric: Option<f64>,
    },
    /// Run `code` through the exec callback and record the classified result
    /// as a draft.
    Execute { code: String },
    /// Fail with the given message.
    Fail(String),
    /// Poll the token until it fires, then report the deadline.
    BlockUntilCancelled { max_wait: Duration },
    /// Insert a draft, then block until cancelled.
    InsertThenBlock { metric: Option<f64>, max_wait: Duration },
    /// Insert a draft and fire the token, as if the deadline expired right
    /// after the step returned.
    InsertAndExpire { metric: Option<f64> },
}

impl ScriptedStep {
    pub fn insert_draft(metric: Option<f64>) -> Self {
        Self::Insert {
            parent: None,
            is_buggy: false,
            metric,
        }
    }

    pub fn insert_child(parent: usize, metric: Option<f64>) -> Self {
        Self::Insert {
            parent: Some(parent),
            is_buggy: false,
            metric,
        }
    }

    pub fn buggy_child(parent: usize) -> Self {
        Self::Insert {
            parent: Some(parent),
            is_buggy: true,
            metric: None,
        }
    }
}

/// Step agent that replays a fixed script, one entry per invocation.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    script: VecDeque<ScriptedStep>,
    calls: usize,
}

impl ScriptedAgent {
    pub fn new(script: Vec<ScriptedStep>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    /// Number of times `step` was invoked.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl StepAgent for ScriptedAgent {
    fn step(
        &mut self,
        journal: &mut Journal,
        exec: &mut dyn ExecCallback,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.calls += 1;
        let step = self
            .script
            .pop_front()
            .ok_or_else(|| anyhow!("scripted agent exhausted after {} calls", self.calls - 1))?;
        match step {
            ScriptedStep::Insert {
                parent,
                is_buggy,
                metric,
            } => {
                journal.insert(parent.map(NodeId::from), is_buggy, metric);
                Ok(())
            }
            ScriptedStep::Execute { code } => {
                let result = exec.exec(&code)?;
                let (is_buggy, metric) = classify_execution(&result);
                journal.insert(None, is_buggy, metric);
                Ok(())
            }
            ScriptedStep::Fail(message) => Err(anyhow!(message)),
            ScriptedStep::BlockUntilCancelled { max_wait } => {
                block_until_cancelled(cancel, max_wait)
            }
            ScriptedStep::InsertThenBlock { metric, max_wait } => {
                journal.insert(None, false, metric);
                block_until_cancelled(cancel, max_wait)
            }
            ScriptedStep::InsertAndExpire { metric } => {
                journal.insert(None, false, metric);
                cancel.cancel();
                Ok(())
            }
        }
    }
}

fn block_until_cancelled(cancel: &CancelToken, max_wait: Duration) -> Result<()> {
    let started = Instant::now();
    while started.elapsed() < max_wait {
        if cancel.is_cancelled() {
            return Err(DeadlineExceeded.into());
        }
        thread::sleep(Duration::from_millis(10));
    }
    Err(anyhow!("cancellation did not arrive within {max_wait:?}"))
}

/// Interpreter that returns queued results (a clean, empty run once drained).
#[derive(Debug, Default)]
pub struct ScriptedInterpreter {
    results: VecDeque<ExecutionResult>,
    codes: Vec<String>,
    cleanups: usize,
}

impl ScriptedInterpreter {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: results.into(),
            ..Self::default()
        }
    }

    /// Code passed to each `run` call, in order.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups
    }
}

impl Interpreter for ScriptedInterpreter {
    fn run(&mut self, code: &str, cancel: &CancelToken) -> Result<ExecutionResult> {
        cancel.check()?;
        self.codes.push(code.to_string());
        Ok(self.results.pop_front().unwrap_or_else(|| success("")))
    }

    fn cleanup_session(&mut self) -> Result<()> {
        self.cleanups += 1;
        Ok(())
    }
}

/// A clean exit with the given output.
pub fn success(term_out: &str) -> ExecutionResult {
    ExecutionResult {
        term_out: term_out.to_string(),
        exit_code: Some(0),
        exec_time_ms: 1,
        timed_out: false,
    }
}

/// A failed exit with the given output.
pub fn failure(term_out: &str) -> ExecutionResult {
    ExecutionResult {
        term_out: term_out.to_string(),
        exit_code: Some(1),
        exec_time_ms: 1,
        timed_out: false,
    }
}

/// Config rooted in a temp directory with the given step budget.
pub fn test_config(root: &Path, steps: usize) -> SearchConfig {
    let mut cfg = SearchConfig {
        exp_name: "test".to_string(),
        workspace_dir: root.join("workspace"),
        log_dir: root.join("logs"),
        ..SearchConfig::default()
    };
    cfg.agent.steps = steps;
    cfg.agent.time_limit_secs = 60;
    cfg
}
