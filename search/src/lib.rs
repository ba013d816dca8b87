//! Time- and step-bounded solution tree search.
//!
//! A [`controller::SearchController`] repeatedly invokes a step function that
//! generates and evaluates candidates, recording each one in an append-only
//! [`core::journal::Journal`]. The run stops when the journal reaches the step
//! budget, when the wall-clock deadline fires, or when a step fails. Progress
//! is checkpointed after every step and once more on the way out.
//!
//! - **[`core`]**: Pure, deterministic logic (journal, best-node selection,
//!   cancellation token, result classification). No I/O.
//! - **[`io`]**: Side-effecting collaborators (processes, deadline timer,
//!   checkpoints, workspace, config).
//!
//! [`controller`] and [`run`] coordinate the two; [`render`] turns a journal
//! into human-readable trees.

pub mod controller;
pub mod core;
pub mod exec_proxy;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod observer;
pub mod render;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
