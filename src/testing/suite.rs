//! Running a selection of tests

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use super::discovery::{find_tests_by_name, find_tests_by_tag, TestDir};
use super::runner::{TestResult, TestRunner};
use super::tags::TagOp;
use crate::common::logging::LoggingContext;
use crate::common::{Error, Result};
use crate::parse::ParserRegistry;
use crate::steps::FunctionRegistry;

/// Runs every test selected by name, suite file or tag
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    to_run: Vec<String>,
    tags: Vec<String>,
    tag_op: TagOp,
    runs_dir: PathBuf,
    search_dirs: Vec<PathBuf>,
    cleanup_on_pass: bool,
    functions: Arc<FunctionRegistry>,
    parsers: Arc<ParserRegistry>,
    logging: LoggingContext,
}

impl SuiteRunner {
    pub fn new(runs_dir: impl Into<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            to_run: Vec::new(),
            tags: Vec::new(),
            tag_op: TagOp::default(),
            runs_dir: runs_dir.into(),
            search_dirs,
            cleanup_on_pass: false,
            functions: Arc::new(FunctionRegistry::with_builtins()),
            parsers: Arc::new(ParserRegistry::default()),
            logging: LoggingContext::new(),
        }
    }

    /// Test names or `.ste` suite files
    pub fn tests(mut self, names: Vec<String>) -> Self {
        self.to_run = names;
        self
    }

    pub fn tags(mut self, tags: Vec<String>, op: TagOp) -> Self {
        self.tags = tags;
        self.tag_op = op;
        self
    }

    pub fn cleanup_on_pass(mut self, cleanup: bool) -> Self {
        self.cleanup_on_pass = cleanup;
        self
    }

    pub fn functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    pub fn parsers(mut self, parsers: Arc<ParserRegistry>) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn logging(mut self, logging: LoggingContext) -> Self {
        self.logging = logging;
        self
    }

    /// Union of the tests selected by name and by tag
    pub fn get_tests(&self) -> Result<BTreeSet<PathBuf>> {
        let mut tests = find_tests_by_name(&self.to_run, &self.search_dirs)?;
        tests.extend(find_tests_by_tag(&self.tags, self.tag_op, &self.search_dirs)?);
        Ok(tests)
    }

    /// Run each selected test once, in sorted order
    pub async fn run_all(&self) -> Result<Vec<TestResult>> {
        let tests = self.get_tests()?;
        if tests.is_empty() {
            return Err(Error::NoTestsFound);
        }
        tracing::info!(count = tests.len(), "Running tests");

        let mut results = Vec::with_capacity(tests.len());
        for path in tests {
            let runner = TestRunner::for_test(TestDir::new(path), &self.runs_dir)
                .cleanup_on_pass(self.cleanup_on_pass)
                .functions(self.functions.clone())
                .parsers(self.parsers.clone())
                .logging(self.logging.clone());
            results.push(runner.execute().await);
        }

        let passed = results.iter().filter(|r| r.passed).count();
        println!(
            "\n{} {} passed, {} failed",
            "Summary:".blue().bold(),
            passed.to_string().green(),
            (results.len() - passed).to_string().red()
        );
        Ok(results)
    }

    /// Whether every selected test passed
    pub async fn run(&self) -> Result<bool> {
        Ok(self.run_all().await?.iter().all(|r| r.passed))
    }
}
