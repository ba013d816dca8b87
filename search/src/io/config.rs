//! Experiment configuration stored as TOML (default `search.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::controller::SearchBudget;

/// Top-level experiment configuration (TOML).
///
/// Missing fields default to values suitable for a short local run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Experiment name, used in logs.
    pub exp_name: String,

    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `tree_search=debug`).
    pub log_level: String,

    /// Ephemeral working directory for generated code. Deleted at the end of a
    /// run that recorded nothing.
    pub workspace_dir: PathBuf,

    /// Destination of the journal snapshot, tree rendering and config copy.
    pub log_dir: PathBuf,

    /// Optional input data copied into `<workspace_dir>/input` before the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    pub agent: AgentConfig,

    pub exec: ExecConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Step budget: stop once the journal holds this many nodes.
    pub steps: usize,

    /// Time budget for the whole run in seconds.
    pub time_limit_secs: u64,

    /// Candidate generator invoked once per step (JSON request on stdin).
    pub command: Vec<String>,

    /// Wall-clock limit for one generator invocation in seconds.
    pub timeout_secs: u64,

    /// Discard generator output beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecConfig {
    /// Interpreter command; the script file name is appended as the last argument.
    pub command: Vec<String>,

    /// File name the generated code is written to inside the workspace.
    pub file_name: String,

    /// Wall-clock limit for one execution in seconds.
    pub timeout_secs: u64,

    /// Truncate captured execution output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exp_name: "run".to_string(),
            log_level: "info".to_string(),
            workspace_dir: PathBuf::from("workspaces/run"),
            log_dir: PathBuf::from("logs/run"),
            data_dir: None,
            agent: AgentConfig::default(),
            exec: ExecConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            steps: 20,
            time_limit_secs: 60 * 60,
            command: vec!["./agent".to_string()],
            timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string()],
            file_name: "runfile.py".to_string(),
            timeout_secs: 60 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.exp_name.trim().is_empty() {
            return Err(anyhow!("exp_name must be non-empty"));
        }
        if self.agent.steps == 0 {
            return Err(anyhow!("agent.steps must be > 0"));
        }
        if self.agent.time_limit_secs == 0 {
            return Err(anyhow!("agent.time_limit_secs must be > 0"));
        }
        if self.agent.timeout_secs == 0 {
            return Err(anyhow!("agent.timeout_secs must be > 0"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.exec.command.is_empty() || self.exec.command[0].trim().is_empty() {
            return Err(anyhow!("exec.command must be a non-empty array"));
        }
        if self.exec.file_name.trim().is_empty() || self.exec.file_name.contains('/') {
            return Err(anyhow!("exec.file_name must be a plain file name"));
        }
        if self.exec.timeout_secs == 0 {
            return Err(anyhow!("exec.timeout_secs must be > 0"));
        }
        if self.exec.output_limit_bytes == 0 {
            return Err(anyhow!("exec.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Step and time budget for the controller.
    pub fn budget(&self) -> SearchBudget {
        SearchBudget {
            steps: self.agent.steps,
            time_limit: Duration::from_secs(self.agent.time_limit_secs),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SearchConfig::default()`.
pub fn load_config(path: &Path) -> Result<SearchConfig> {
    if !path.exists() {
        let cfg = SearchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SearchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SearchConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, SearchConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = SearchConfig {
            exp_name: "house-prices".to_string(),
            data_dir: Some(PathBuf::from("data/house-prices")),
            ..SearchConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("search.toml");
        fs::write(
            &path,
            "exp_name = \"quick\"\n\n[agent]\nsteps = 3\ntime_limit_secs = 30\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.exp_name, "quick");
        assert_eq!(cfg.agent.steps, 3);
        assert_eq!(cfg.agent.command, AgentConfig::default().command);
        assert_eq!(cfg.budget().time_limit, Duration::from_secs(30));
        assert_eq!(cfg.exec, ExecConfig::default());
    }

    #[test]
    fn rejects_zero_budgets() {
        let mut cfg = SearchConfig::default();
        cfg.agent.steps = 0;
        assert!(cfg.validate().unwrap_err().to_string().contains("agent.steps"));

        let mut cfg = SearchConfig::default();
        cfg.agent.time_limit_secs = 0;
        assert!(
            cfg.validate()
                .unwrap_err()
                .to_string()
                .contains("agent.time_limit_secs")
        );
    }
}
