//! hyalus - file-driven test automation
//!
//! Tests are directories holding a declarative `config.yaml` and input
//! fixtures. Running a test creates a fresh run directory, executes the
//! configured steps (subprocesses, registered functions and assertions) in
//! it, and records every step outcome in per-step logs.
//!
//! Assertions compare literal values or values pulled out of result files:
//! a two-element `[path, selector]` argument naming an existing JSON, TSV,
//! CSV or NPZ file is parsed and searched before comparison.

pub mod cli;
pub mod commands;
pub mod common;
pub mod parse;
pub mod resolve;
pub mod steps;
pub mod testing;
pub mod value;

// Re-export commonly used types
pub use common::{Error, Result};
pub use value::Value;
