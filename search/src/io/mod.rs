//! I/O helpers and collaborator adapters for the search runner.

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod deadline;
pub mod interpreter;
pub mod process;
pub mod workspace;
