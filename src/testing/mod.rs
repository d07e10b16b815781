//! Test discovery, run management and the runners built on them
//!
//! A test is a directory holding a `config.yaml` and an optional `input/`
//! directory. Running it materializes a run directory named
//! `{test}_{date}_{suffix}` under the runs directory, then executes the
//! configured steps there.

pub mod clean;
pub mod config;
pub mod discovery;
pub mod harness;
pub mod list;
pub mod runner;
pub mod runs;
pub mod suite;
pub mod tags;
pub mod template;

pub use clean::CleanRunner;
pub use config::{StepSpec, TestConfig};
pub use discovery::{find_all_tests, find_fs_obj, find_tests_by_name, find_tests_by_tag, TestDir};
pub use harness::{HarnessedAction, StepHarness};
pub use list::ListRunner;
pub use runner::{TestResult, TestRunner};
pub use runs::{find_relevant_test_runs, find_test_runs, RunFilter, RunName, TestRun};
pub use suite::SuiteRunner;
pub use tags::{Tag, TagOp, TagType};
pub use template::TemplateRunner;
