//! Stable exit codes for the `tree-search` CLI.

/// The run completed or timed out; progress was persisted.
pub const OK: i32 = 0;
/// The run failed, or the config/snapshot was invalid.
pub const FAILED: i32 = 1;
