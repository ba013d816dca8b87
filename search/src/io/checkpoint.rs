//! Journal checkpoints and end-of-run workspace cleanup.
//!
//! Every checkpoint is a full rewrite of `journal.json` (and the `tree.txt`
//! rendering beside it), written via temp file + rename so a reader never sees
//! a partially written snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::journal::{Journal, JournalSnapshot};
use crate::render::journal_to_string_tree;

const JOURNAL_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/journal/v1.schema.json"
));

/// Snapshot destination for one run.
#[derive(Debug, Clone)]
pub struct JournalStore {
    log_dir: PathBuf,
    journal_path: PathBuf,
    tree_path: PathBuf,
}

impl JournalStore {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let log_dir = log_dir.into();
        Self {
            journal_path: log_dir.join("journal.json"),
            tree_path: log_dir.join("tree.txt"),
            log_dir,
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn tree_path(&self) -> &Path {
        &self.tree_path
    }

    /// Overwrite the stored snapshot with the full current journal.
    pub fn persist(&self, journal: &Journal) -> Result<()> {
        debug!(path = %self.journal_path.display(), nodes = journal.len(), "writing checkpoint");
        let mut buf = serde_json::to_string_pretty(&journal.to_snapshot())
            .context("serialize journal snapshot")?;
        buf.push('\n');
        write_atomic(&self.journal_path, &buf)?;
        write_atomic(&self.tree_path, &journal_to_string_tree(journal))
    }

    /// Load the last persisted snapshot.
    pub fn load(&self) -> Result<Journal> {
        load_journal(&self.journal_path)
    }
}

/// Load and validate a journal snapshot (schema + structural invariants).
pub fn load_journal(path: &Path) -> Result<Journal> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read journal {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse journal {}", path.display()))?;
    validate_schema(&value)?;
    let snapshot: JournalSnapshot = serde_json::from_value(value)
        .with_context(|| format!("deserialize journal {}", path.display()))?;
    Journal::from_snapshot(snapshot).with_context(|| format!("rebuild journal {}", path.display()))
}

/// Delete `workspace` if the journal never recorded a node.
///
/// Returns `true` when the directory was removed. A missing workspace is not
/// an error.
pub fn maybe_cleanup_workspace(journal: &Journal, workspace: &Path) -> Result<bool> {
    if !journal.is_empty() {
        debug!(nodes = journal.len(), "keeping workspace with recorded progress");
        return Ok(false);
    }
    if !workspace.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(workspace)
        .with_context(|| format!("remove workspace {}", workspace.display()))?;
    info!(workspace = %workspace.display(), "removed workspace of run without progress");
    Ok(true)
}

fn validate_schema(journal: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(JOURNAL_SCHEMA).context("parse journal schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(journal) {
        let messages = compiled
            .iter_errors(journal)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "journal schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("checkpoint path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp checkpoint {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace checkpoint {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Journal {
        let mut journal = Journal::new();
        let root = journal.insert(None, false, Some(0.25));
        journal.insert(Some(root), true, None);
        journal
    }

    #[test]
    fn persist_twice_without_changes_is_identical() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JournalStore::new(temp.path().join("logs"));
        let journal = sample();

        store.persist(&journal).expect("first persist");
        let first = fs::read(store.journal_path()).expect("read first");
        store.persist(&journal).expect("second persist");
        let second = fs::read(store.journal_path()).expect("read second");

        assert_eq!(first, second);
        assert!(store.tree_path().is_file());
    }

    #[test]
    fn persist_overwrites_previous_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JournalStore::new(temp.path());
        let mut journal = sample();
        store.persist(&journal).expect("persist");

        journal.insert(None, false, Some(0.75));
        store.persist(&journal).expect("persist again");

        let loaded = store.load().expect("load");
        assert_eq!(loaded, journal);
        let tree = fs::read_to_string(store.tree_path()).expect("read tree");
        assert!(tree.contains("● 0.750 (best) (ID: 2)"));
    }

    #[test]
    fn snapshot_format_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JournalStore::new(temp.path());
        let mut journal = Journal::new();
        journal.insert(None, false, Some(0.5));
        store.persist(&journal).expect("persist");

        let contents = fs::read_to_string(store.journal_path()).expect("read");
        let expected = "{\n  \"version\": 1,\n  \"nodes\": [\n    {\n      \"id\": 0,\n      \"parent\": null,\n      \"children\": [],\n      \"is_buggy\": false,\n      \"metric\": 0.5\n    }\n  ]\n}\n";
        assert_eq!(contents, expected);
    }

    #[test]
    fn load_rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("journal.json");
        fs::write(&path, r#"{"version": 1, "nodes": [{"id": 0}]}"#).expect("write");

        let err = load_journal(&path).unwrap_err();
        assert!(format!("{err:#}").contains("journal schema validation failed"));
    }

    #[test]
    fn load_rejects_broken_tree_links() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("journal.json");
        fs::write(
            &path,
            r#"{"version": 1, "nodes": [
                {"id": 0, "parent": null, "children": [], "is_buggy": false, "metric": 0.1},
                {"id": 1, "parent": 0, "children": [], "is_buggy": false, "metric": 0.2}
            ]}"#,
        )
        .expect("write");

        let err = load_journal(&path).unwrap_err();
        assert!(format!("{err:#}").contains("journal invariants failed"));
    }

    #[test]
    fn cleanup_removes_workspace_only_without_progress() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = temp.path().join("workspace");
        fs::create_dir_all(workspace.join("input")).expect("create workspace");

        assert!(!maybe_cleanup_workspace(&sample(), &workspace).expect("cleanup"));
        assert!(workspace.is_dir());

        assert!(maybe_cleanup_workspace(&Journal::new(), &workspace).expect("cleanup"));
        assert!(!workspace.exists());

        assert!(!maybe_cleanup_workspace(&Journal::new(), &workspace).expect("cleanup"));
    }
}
