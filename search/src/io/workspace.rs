//! Workspace preparation and the run-scoped cleanup guard.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::journal::Journal;
use crate::io::checkpoint::maybe_cleanup_workspace;

/// Create the workspace and copy `data_dir` (if any) into `<workspace>/input`.
pub fn prepare_workspace(workspace: &Path, data_dir: Option<&Path>) -> Result<()> {
    fs::create_dir_all(workspace)
        .with_context(|| format!("create workspace {}", workspace.display()))?;
    let Some(data_dir) = data_dir else {
        return Ok(());
    };

    let input_dir = workspace.join("input");
    let mut copied = 0usize;
    for entry in WalkDir::new(data_dir).follow_links(true) {
        let entry = entry.with_context(|| format!("walk {}", data_dir.display()))?;
        let relative = entry
            .path()
            .strip_prefix(data_dir)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let target = input_dir.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} to {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        }
    }
    info!(
        files = copied,
        data_dir = %data_dir.display(),
        workspace = %workspace.display(),
        "workspace prepared"
    );
    Ok(())
}

/// Owns the journal for the lifetime of a run.
///
/// When the scope is dropped, on success, timeout, error or panic unwinding,
/// the workspace is removed if the journal is still empty.
#[derive(Debug)]
pub struct RunScope {
    journal: Journal,
    workspace: PathBuf,
}

impl RunScope {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            journal: Journal::new(),
            workspace: workspace.into(),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        match maybe_cleanup_workspace(&self.journal, &self.workspace) {
            Ok(removed) => debug!(removed, "run scope closed"),
            Err(err) => warn!(err = %format!("{err:#}"), "workspace cleanup failed"),
        }
    }
}
