//! Deterministic, pure logic shared by the search runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod cancel;
pub mod classifier;
pub mod invariants;
pub mod journal;
pub mod types;
