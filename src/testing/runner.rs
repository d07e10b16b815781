//! Single test execution
//!
//! Materializes a run directory for one test, then drives its steps in order
//! while the run log and each step log receive the log events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use super::discovery::{find_fs_obj, TestDir};
use super::runs::{make_run_dir, write_run_metadata, DEFAULT_SUFFIX_LEN};
use crate::common::files::copy_dir_contents;
use crate::common::logging::LoggingContext;
use crate::common::paths::{CONFIG_FILE, INPUT_DIR, RUN_LOG};
use crate::common::{Error, Result};
use crate::parse::ParserRegistry;
use crate::steps::{step_log_path, FunctionRegistry, Step, StepOutput, StepStatus};

/// Result of a test run
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name: String,
    pub run_dir: Option<PathBuf>,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub outputs: Vec<StepOutput>,
    pub error: Option<String>,
}

impl TestResult {
    fn aborted(name: String, steps_total: usize, error: &Error) -> Self {
        Self {
            name,
            run_dir: None,
            passed: false,
            steps_run: 0,
            steps_total,
            outputs: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Runs one test in a fresh run directory
#[derive(Debug, Clone)]
pub struct TestRunner {
    test: TestDir,
    runs_dir: PathBuf,
    cleanup_on_pass: bool,
    functions: Arc<FunctionRegistry>,
    parsers: Arc<ParserRegistry>,
    logging: LoggingContext,
}

impl TestRunner {
    /// Locate the test called `name` and prepare to run it
    pub fn new(name: &str, runs_dir: impl Into<PathBuf>, search_dirs: &[PathBuf]) -> Result<Self> {
        let path = find_fs_obj(name, search_dirs)?;
        Ok(Self::for_test(TestDir::new(path), runs_dir))
    }

    pub fn for_test(test: TestDir, runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            test,
            runs_dir: runs_dir.into(),
            cleanup_on_pass: false,
            functions: Arc::new(FunctionRegistry::with_builtins()),
            parsers: Arc::new(ParserRegistry::default()),
            logging: LoggingContext::new(),
        }
    }

    /// Remove the run directory when every step passes
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

    pub fn test(&self) -> &TestDir {
        &self.test
    }

    /// Run the test, returning whether every step passed
    pub async fn run(&self) -> bool {
        self.execute().await.passed
    }

    /// Run the test and report every step outcome
    pub async fn execute(&self) -> TestResult {
        let name = self.test.name();
        println!("\n{} {}", "Running Test:".blue().bold(), name.white().bold());

        if !self.test.is_valid() {
            let err = Error::invalid_config(
                crate::common::ConfigStatus::NotFound,
                format!("{} is not a valid test directory", self.test.path().display()),
            );
            tracing::error!(test = %name, error = %err, "Cannot run test");
            println!("  {} {}", "✗".red(), err);
            return TestResult::aborted(name, 0, &err);
        }

        let config = match self.test.load_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(test = %name, error = %e, "Invalid test config");
                println!("  {} {}", "✗".red(), e);
                return TestResult::aborted(name, 0, &e);
            }
        };
        let steps_total = config.steps.len();
        let mut steps = match config.build_steps(&self.functions) {
            Ok(steps) => steps,
            Err(e) => {
                tracing::error!(test = %name, error = %e, "Could not build steps");
                println!("  {} {}", "✗".red(), e);
                return TestResult::aborted(name, steps_total, &e);
            }
        };
        println!("  {}", config.description.dimmed());

        let run_dir = match self.prepare_run_dir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!(test = %name, error = %e, "Could not create run directory");
                println!("  {} {}", "✗".red(), e);
                return TestResult::aborted(name, steps_total, &e);
            }
        };

        let run_log = run_dir.join(RUN_LOG);
        if let Err(e) = self.logging.attach(&run_log) {
            tracing::warn!(path = %run_log.display(), error = %e, "Could not open run log");
        }
        tracing::info!(test = %name, run_dir = %run_dir.display(), "Starting test run");

        let outputs = self.run_steps(&mut steps, &run_dir).await;
        let passed = outputs.len() == steps_total && outputs.iter().all(StepOutput::passed);

        if passed {
            tracing::info!(test = %name, "Test passed");
        } else {
            tracing::warn!(test = %name, "Test failed");
        }
        self.logging.detach(&run_log);

        if passed && self.cleanup_on_pass {
            match std::fs::remove_dir_all(&run_dir) {
                Ok(()) => tracing::debug!(run_dir = %run_dir.display(), "Removed passing run"),
                Err(e) => tracing::warn!(run_dir = %run_dir.display(), error = %e, "Could not remove run"),
            }
        }

        let status = if passed { "PASSED".green() } else { "FAILED".red() };
        println!("  {} {}/{} steps", status.bold(), outputs.len(), steps_total);

        TestResult {
            name,
            run_dir: Some(run_dir),
            passed,
            steps_run: outputs.len(),
            steps_total,
            outputs,
            error: None,
        }
    }

    fn prepare_run_dir(&self) -> Result<PathBuf> {
        let run_dir = make_run_dir(&self.test, &self.runs_dir, DEFAULT_SUFFIX_LEN)?;
        let input = self.test.input_dir();
        if input.is_dir() {
            copy_dir_contents(&input, &run_dir.join(INPUT_DIR))?;
        }
        std::fs::copy(self.test.config_path(), run_dir.join(CONFIG_FILE))?;
        write_run_metadata(&run_dir)?;
        Ok(run_dir)
    }

    async fn run_steps(&self, steps: &mut [Step], run_dir: &Path) -> Vec<StepOutput> {
        let mut outputs: Vec<StepOutput> = Vec::with_capacity(steps.len());

        for (i, step) in steps.iter_mut().enumerate() {
            let number = i + 1;
            let step_log = step_log_path(run_dir, number, step.class_name());
            if let Err(e) = self.logging.attach(&step_log) {
                tracing::warn!(path = %step_log.display(), error = %e, "Could not open step log");
            }
            tracing::info!(step = number, "Running {step}");

            let output = match unmet_need(step.needs(), &outputs) {
                Some(need) => StepOutput::error(format!("Needed step {need} did not pass")),
                None => step.run_with(number, run_dir, &self.parsers).await,
            };
            tracing::info!(step = number, status = %output.status, "{}", output.output.trim_end());
            self.logging.detach(&step_log);

            let mark = match output.status {
                StepStatus::Pass => "✓".green(),
                StepStatus::Fail => "✗".red(),
                StepStatus::Error => "✗".yellow(),
            };
            println!("  {} {} {}", mark, number, step.to_string().dimmed());

            let halt = !output.passed() && step.halt_on_failure();
            outputs.push(output);
            if halt {
                tracing::warn!(step = number, "Halting test run");
                break;
            }
        }
        outputs
    }
}

/// First needed step that did not pass
fn unmet_need(needs: Option<&[usize]>, outputs: &[StepOutput]) -> Option<usize> {
    needs?.iter().copied().find(|n| {
        n.checked_sub(1)
            .and_then(|i| outputs.get(i))
            .map_or(true, |o| !o.passed())
    })
}
