//! Shared fixtures for the integration tests
//!
//! Every test builds its own tree of tests, suites and runs inside a
//! temporary directory, so tests can run in parallel.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use hyalus::steps::{FunctionHost, FunctionRegistry};
use tempfile::TempDir;

/// The built-in functions, served by the hyalus binary
///
/// A test binary can't answer `run-function` itself, so library-level runs
/// point their function steps at the real binary.
pub fn builtin_functions() -> Arc<FunctionRegistry> {
    let host = FunctionHost::new(env!("CARGO_BIN_EXE_hyalus"));
    Arc::new(FunctionRegistry::with_builtins().served_by(host))
}

/// Test context with paths and cleanup
pub struct TestContext {
    /// Removed on drop
    temp_dir: TempDir,
    /// Directory holding the test directories
    pub tests_dir: PathBuf,
    /// Directory receiving run directories
    pub runs_dir: PathBuf,
    /// Config directory (XDG_CONFIG_HOME)
    pub config_dir: PathBuf,
    /// Data directory (XDG_DATA_HOME)
    pub data_dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        let tests_dir = root.join("tests");
        let runs_dir = root.join("runs");
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        for dir in [&tests_dir, &config_dir, &data_dir] {
            fs::create_dir_all(dir).expect("Failed to create fixture dir");
        }

        Self {
            temp_dir,
            tests_dir,
            runs_dir,
            config_dir,
            data_dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a test with the given tags and YAML step list
    pub fn write_test(&self, name: &str, tags: &[&str], steps: &str) -> PathBuf {
        let test = self.tests_dir.join(name);
        fs::create_dir_all(test.join("input")).expect("Failed to create test dir");
        let config = format!(
            "description: {name} fixture\ninput_data: files in input/\ntags: [{}]\nsteps:\n{steps}",
            tags.join(", ")
        );
        fs::write(test.join("config.yaml"), config).expect("Failed to write config");
        test
    }

    /// Place a file in a test's input directory
    pub fn write_input(&self, test: &str, rel: &str, content: &str) -> PathBuf {
        let path = self.tests_dir.join(test).join("input").join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create input dir");
        }
        fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Write a suite file listing `entries`
    pub fn write_suite(&self, name: &str, entries: &[&str]) -> PathBuf {
        let path = self.tests_dir.join(format!("{name}.ste"));
        let mut content = String::from("# fixture suite\n");
        for entry in entries {
            content.push_str(entry);
            content.push('\n');
        }
        fs::write(&path, content).expect("Failed to write suite");
        path
    }

    /// Run directories currently under `runs_dir`
    pub fn run_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.runs_dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .map(|e| e.expect("Failed to read runs dir").path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    /// The hyalus binary with settings isolated to this context
    pub fn hyalus(&self) -> Command {
        let mut cmd = Command::cargo_bin("hyalus").expect("Failed to find hyalus binary");
        cmd.current_dir(self.root())
            .env("XDG_CONFIG_HOME", &self.config_dir)
            .env("XDG_DATA_HOME", &self.data_dir)
            .env("HOME", self.root())
            .env_remove("RUST_LOG");
        cmd
    }
}

/// Steps writing a coffee order result, then checking it
pub const COFFEE_STEPS: &str = r#"  - action: run_function
    function: write_json
    args: [output/coffee.json, {best_coffee_shop: Ozo, orders: [latte, mocha]}]
  - action: assert_eq
    args: [[output/coffee.json, [best_coffee_shop]], Ozo]
    halt_on_failure: true
  - action: assert_in
    args: [mocha, [output/coffee.json, [orders]]]
  - action: assert_keys_contain
    args: [[input/menu.json, []], espresso]
"#;
