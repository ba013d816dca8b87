//! Step function abstraction and the command-backed candidate generator.
//!
//! A [`StepAgent`] produces new candidates and records them in the journal.
//! [`CommandAgent`] delegates generation to an external program: it sends a
//! JSON request on stdin and expects a JSON reply on stdout naming the parent
//! to improve (or `null` for a fresh draft) and the code to run.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::cancel::CancelToken;
use crate::core::classifier::classify_execution;
use crate::core::journal::{Journal, Node, NodeId};
use crate::exec_proxy::ExecCallback;
use crate::io::config::AgentConfig;
use crate::io::process::run_command;

/// One improvement step.
pub trait StepAgent {
    /// Generate, run and record candidates. Implementations insert into
    /// `journal` and should return
    /// [`DeadlineExceeded`](crate::core::cancel::DeadlineExceeded) promptly once
    /// `cancel` fires.
    fn step(
        &mut self,
        journal: &mut Journal,
        exec: &mut dyn ExecCallback,
        cancel: &CancelToken,
    ) -> Result<()>;
}

/// Request written to the generator's stdin.
#[derive(Debug, Serialize)]
pub struct AgentRequest<'a> {
    /// 1-indexed invocation counter.
    pub step: usize,
    pub best: Option<&'a Node>,
    pub nodes: &'a [Node],
}

/// Reply read from the generator's stdout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentReply {
    pub parent: Option<NodeId>,
    pub code: String,
}

/// Agent that spawns an external generator command once per step.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    workdir: PathBuf,
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    invocations: usize,
}

impl CommandAgent {
    pub fn new(workdir: impl Into<PathBuf>, cfg: &AgentConfig) -> Self {
        Self {
            workdir: workdir.into(),
            command: cfg.command.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
            invocations: 0,
        }
    }

    fn request_reply(&self, journal: &Journal, cancel: &CancelToken) -> Result<AgentReply> {
        let request = AgentRequest {
            step: self.invocations,
            best: journal.best_node().and_then(|id| journal.get(id)),
            nodes: journal.nodes(),
        };
        let payload = serde_json::to_vec(&request).context("serialize agent request")?;

        let (program, args) = self
            .command
            .split_first()
            .context("agent command is empty")?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.workdir);

        let output = run_command(
            cmd,
            Some(payload.as_slice()),
            self.timeout,
            self.output_limit_bytes,
            cancel,
        )
        .context("run agent command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "agent command timed out");
            return Err(anyhow!("agent command timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent command failed");
            return Err(anyhow!(
                "agent command failed with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        if output.stdout_truncated > 0 {
            return Err(anyhow!(
                "agent reply exceeds {} bytes",
                self.output_limit_bytes
            ));
        }
        serde_json::from_slice(&output.stdout).context("parse agent reply")
    }
}

impl StepAgent for CommandAgent {
    #[instrument(skip_all, fields(step = self.invocations + 1, nodes = journal.len()))]
    fn step(
        &mut self,
        journal: &mut Journal,
        exec: &mut dyn ExecCallback,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.invocations += 1;
        let reply = self.request_reply(journal, cancel)?;
        if let Some(parent) = reply.parent
            && !journal.contains(parent)
        {
            return Err(anyhow!("agent reply references unknown parent node {parent}"));
        }

        let result = exec.exec(&reply.code)?;
        let (is_buggy, metric) = classify_execution(&result);
        let id = journal.insert(reply.parent, is_buggy, metric);
        info!(
            node = %id,
            parent = ?reply.parent.map(|p| p.index()),
            is_buggy,
            ?metric,
            "candidate recorded"
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::cancel::is_deadline_exceeded;
    use crate::core::types::ExecutionResult;
    use std::fs;

    struct FixedExec {
        result: ExecutionResult,
        codes: Vec<String>,
    }

    impl ExecCallback for FixedExec {
        fn exec(&mut self, code: &str) -> Result<ExecutionResult> {
            self.codes.push(code.to_string());
            Ok(self.result.clone())
        }
    }

    fn fixed_exec(term_out: &str, exit_code: i32) -> FixedExec {
        FixedExec {
            result: ExecutionResult {
                term_out: term_out.to_string(),
                exit_code: Some(exit_code),
                exec_time_ms: 1,
                timed_out: false,
            },
            codes: Vec::new(),
        }
    }

    fn agent(workdir: &std::path::Path, script: &str) -> CommandAgent {
        CommandAgent::new(
            workdir,
            &AgentConfig {
                command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
                timeout_secs: 5,
                ..AgentConfig::default()
            },
        )
    }

    #[test]
    fn records_scored_draft_from_reply() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut agent = agent(
            temp.path(),
            r#"cat > request.json; echo '{"parent": null, "code": "print(0.5)"}'"#,
        );
        let mut exec = fixed_exec("0.5\n", 0);
        let mut journal = Journal::new();

        agent
            .step(&mut journal, &mut exec, &CancelToken::new())
            .expect("step");

        assert_eq!(exec.codes, vec!["print(0.5)".to_string()]);
        assert_eq!(journal.len(), 1);
        let node = journal.get(NodeId::from(0)).expect("node");
        assert_eq!(node.metric, Some(0.5));
        assert!(node.is_draft());

        let request = fs::read_to_string(temp.path().join("request.json")).expect("request");
        assert!(request.contains("\"step\":1"));
    }

    #[test]
    fn records_buggy_child_when_execution_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut agent = agent(
            temp.path(),
            r#"cat >/dev/null; echo '{"parent": 0, "code": "raise"}'"#,
        );
        let mut exec = fixed_exec("Traceback", 1);
        let mut journal = Journal::new();
        let root = journal.insert(None, false, Some(0.1));

        agent
            .step(&mut journal, &mut exec, &CancelToken::new())
            .expect("step");

        let child = journal.get(NodeId::from(1)).expect("child");
        assert!(child.is_buggy);
        assert_eq!(child.parent, Some(root));
    }

    #[test]
    fn rejects_unknown_parent_without_executing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut agent = agent(
            temp.path(),
            r#"cat >/dev/null; echo '{"parent": 9, "code": "x"}'"#,
        );
        let mut exec = fixed_exec("", 0);
        let mut journal = Journal::new();

        let err = agent
            .step(&mut journal, &mut exec, &CancelToken::new())
            .unwrap_err();

        assert!(err.to_string().contains("unknown parent node 9"));
        assert!(exec.codes.is_empty());
        assert!(journal.is_empty());
    }

    #[test]
    fn failing_generator_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut agent = agent(temp.path(), "cat >/dev/null; echo nope >&2; exit 2");
        let mut exec = fixed_exec("", 0);
        let mut journal = Journal::new();

        let err = agent
            .step(&mut journal, &mut exec, &CancelToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("agent command failed"));
    }

    #[test]
    fn cancelled_step_reports_deadline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut agent = agent(temp.path(), "exec sleep 5");
        let mut exec = fixed_exec("", 0);
        let mut journal = Journal::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = agent.step(&mut journal, &mut exec, &cancel).unwrap_err();
        assert!(is_deadline_exceeded(&err));
        assert!(journal.is_empty());
    }
}
