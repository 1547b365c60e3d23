//! High-level commands for rconf operations.
//!
//! These are called by the CLI frontend.

pub mod run;

pub use run::RunCommand;
