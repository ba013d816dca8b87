//! Interpreter abstraction for running generated code.
//!
//! The [`Interpreter`] trait decouples the search loop from the execution
//! backend. Tests use scripted interpreters that return predetermined results
//! without spawning processes.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::cancel::CancelToken;
use crate::core::types::ExecutionResult;
use crate::io::config::ExecConfig;
use crate::io::process::run_command;

/// Abstraction over code execution backends.
pub trait Interpreter {
    /// Run `code` to completion. Must return promptly with
    /// [`DeadlineExceeded`](crate::core::cancel::DeadlineExceeded) once `cancel` fires.
    fn run(&mut self, code: &str, cancel: &CancelToken) -> Result<ExecutionResult>;

    /// Release per-run resources. Called once when the run ends.
    fn cleanup_session(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Interpreter that writes the code to a file in the workspace and runs the
/// configured command on it.
#[derive(Debug, Clone)]
pub struct ProcessInterpreter {
    workdir: PathBuf,
    command: Vec<String>,
    file_name: String,
    script_path: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessInterpreter {
    pub fn new(workdir: impl Into<PathBuf>, cfg: &ExecConfig) -> Self {
        let workdir = workdir.into();
        Self {
            script_path: workdir.join(&cfg.file_name),
            workdir,
            command: cfg.command.clone(),
            file_name: cfg.file_name.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    /// Override the per-execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Interpreter for ProcessInterpreter {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs(), code_bytes = code.len()))]
    fn run(&mut self, code: &str, cancel: &CancelToken) -> Result<ExecutionResult> {
        fs::write(&self.script_path, code)
            .with_context(|| format!("write script {}", self.script_path.display()))?;

        let (program, args) = self
            .command
            .split_first()
            .context("interpreter command is empty")?;
        let mut cmd = Command::new(program);
        // Relative to `current_dir`, so a relative workspace path still resolves.
        cmd.args(args)
            .arg(&self.file_name)
            .current_dir(&self.workdir);

        let output = run_command(cmd, None, self.timeout, self.output_limit_bytes, cancel)
            .context("run interpreter")?;
        let result = ExecutionResult {
            term_out: output.combined_output("exec"),
            exit_code: output.status.code(),
            exec_time_ms: u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX),
            timed_out: output.timed_out,
        };
        debug!(
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            exec_time_ms = result.exec_time_ms,
            "execution finished"
        );
        Ok(result)
    }

    fn cleanup_session(&mut self) -> Result<()> {
        if self.script_path.exists() {
            fs::remove_file(&self.script_path)
                .with_context(|| format!("remove script {}", self.script_path.display()))?;
            info!(path = %self.script_path.display(), "interpreter session cleaned up");
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh_config() -> ExecConfig {
        ExecConfig {
            command: vec!["sh".to_string()],
            file_name: "runfile.sh".to_string(),
            timeout_secs: 5,
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn runs_code_in_workdir_and_captures_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut interpreter = ProcessInterpreter::new(temp.path(), &sh_config());

        let result = interpreter
            .run("pwd >/dev/null; echo 0.42", &CancelToken::new())
            .expect("run");

        assert!(result.succeeded());
        assert_eq!(result.term_out, "0.42\n");
        assert!(temp.path().join("runfile.sh").is_file());

        interpreter.cleanup_session().expect("cleanup");
        assert!(!temp.path().join("runfile.sh").exists());
    }

    #[test]
    fn failing_code_is_a_result_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut interpreter = ProcessInterpreter::new(temp.path(), &sh_config());

        let result = interpreter
            .run("echo oops >&2; exit 3", &CancelToken::new())
            .expect("run");

        assert_eq!(result.exit_code, Some(3));
        assert!(!result.succeeded());
        assert!(result.term_out.contains("oops"));
    }

    #[test]
    fn execution_timeout_is_reported_in_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut interpreter = ProcessInterpreter::new(temp.path(), &sh_config())
            .with_timeout(Duration::from_millis(200));

        let result = interpreter
            .run("exec sleep 5", &CancelToken::new())
            .expect("run");

        assert!(result.timed_out);
        assert!(!result.succeeded());
    }
}
