//! Step execution engine
//!
//! A [`Step`] wraps one of the step families and drives it through its
//! lifecycle: load the run context, resolve arguments, execute, then
//! post-process. Any error on the way becomes an ERROR output rather than
//! escaping to the caller.

pub mod assertion;
pub mod compare;
pub mod function;
pub mod subprocess;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::paths::{HYALUS_DIR, INPUT_DIR, OUTPUT_DIR, RUN_LOG, TMP_DIR};
use crate::common::{Error, Result};
use crate::parse::ParserRegistry;

pub use assertion::{AssertionKind, AssertionStep};
pub use function::{
    FunctionCall, FunctionError, FunctionHost, FunctionRegistry, FunctionRequest, FunctionStep,
    StepFn,
};
pub use subprocess::SubprocessStep;

/// Outcome of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pass => "PASS",
            StepStatus::Fail => "FAIL",
            StepStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Output text plus outcome of a finished step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub output: String,
    pub status: StepStatus,
}

impl StepOutput {
    pub fn new(output: impl Into<String>, status: StepStatus) -> Self {
        Self {
            output: output.into(),
            status,
        }
    }

    pub fn pass(output: impl Into<String>) -> Self {
        Self::new(output, StepStatus::Pass)
    }

    pub fn fail(output: impl Into<String>) -> Self {
        Self::new(output, StepStatus::Fail)
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self::new(output, StepStatus::Error)
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Pass
    }
}

/// Lifecycle position of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Created,
    Loaded,
    PreProcessed,
    Ran,
    Complete,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepState::Created => "created",
            StepState::Loaded => "loaded",
            StepState::PreProcessed => "pre-processed",
            StepState::Ran => "ran",
            StepState::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Where a loaded step lives inside its run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub step_number: usize,
    pub run_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub hyalus_dir: PathBuf,
    pub run_log: PathBuf,
    pub step_log: PathBuf,
}

impl StepContext {
    pub fn new(step_number: usize, run_dir: &Path, class_name: &str) -> Self {
        Self {
            step_number,
            run_dir: run_dir.to_path_buf(),
            input_dir: run_dir.join(INPUT_DIR),
            output_dir: run_dir.join(OUTPUT_DIR),
            tmp_dir: run_dir.join(TMP_DIR),
            hyalus_dir: run_dir.join(HYALUS_DIR),
            run_log: run_dir.join(RUN_LOG),
            step_log: step_log_path(run_dir, step_number, class_name),
        }
    }

    /// A path relative to the run directory; absolute paths are kept
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.run_dir.join(rel)
    }
}

/// `{run_dir}/hyalus/{n}_{ClassName}_log.txt`
pub fn step_log_path(run_dir: &Path, step_number: usize, class_name: &str) -> PathBuf {
    run_dir
        .join(HYALUS_DIR)
        .join(format!("{step_number}_{class_name}_log.txt"))
}

/// The step families
#[derive(Debug, Clone)]
pub enum StepKind {
    Subprocess(SubprocessStep),
    Function(FunctionStep),
    Assertion(AssertionStep),
}

impl From<SubprocessStep> for StepKind {
    fn from(s: SubprocessStep) -> Self {
        StepKind::Subprocess(s)
    }
}

impl From<FunctionStep> for StepKind {
    fn from(s: FunctionStep) -> Self {
        StepKind::Function(s)
    }
}

impl From<AssertionStep> for StepKind {
    fn from(s: AssertionStep) -> Self {
        StepKind::Assertion(s)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Subprocess(s) => write!(f, "{s}"),
            StepKind::Function(s) => write!(f, "{s}"),
            StepKind::Assertion(s) => write!(f, "{s}"),
        }
    }
}

/// One unit of work in a test
#[derive(Debug, Clone)]
pub struct Step {
    kind: StepKind,
    halt_on_failure: bool,
    needs: Option<Vec<usize>>,
    state: StepState,
    context: Option<StepContext>,
}

impl Step {
    pub fn new(kind: impl Into<StepKind>) -> Self {
        Self {
            kind: kind.into(),
            halt_on_failure: false,
            needs: None,
            state: StepState::Created,
            context: None,
        }
    }

    /// Stop the test run when this step does not pass
    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Earlier step numbers that must pass before this one runs
    pub fn with_needs(mut self, needs: Vec<usize>) -> Self {
        self.needs = Some(needs);
        self
    }

    pub fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    pub fn needs(&self) -> Option<&[usize]> {
        self.needs.as_deref()
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn context(&self) -> Option<&StepContext> {
        self.context.as_ref()
    }

    /// Name used in step log file names
    pub fn class_name(&self) -> &'static str {
        match &self.kind {
            StepKind::Subprocess(_) => "SubprocessStep",
            StepKind::Function(_) => "RunFunctionStep",
            StepKind::Assertion(a) => a.kind().class_name(),
        }
    }

    /// Bind the step to its position in a run
    pub fn load(&mut self, step_number: usize, run_dir: &Path) -> Result<&StepContext> {
        if self.state != StepState::Created {
            return Err(Error::invalid_step_state("load", self.state));
        }
        self.state = StepState::Loaded;
        let context = StepContext::new(step_number, run_dir, self.class_name());
        Ok(&*self.context.insert(context))
    }

    /// Resolve path references in the arguments
    ///
    /// Relative paths resolve against the run directory once loaded.
    pub fn pre_process(&mut self, registry: &ParserRegistry) -> Result<()> {
        if !matches!(self.state, StepState::Created | StepState::Loaded) {
            return Err(Error::invalid_step_state("pre-process", self.state));
        }
        let base = self.context.as_ref().map(|c| c.run_dir.as_path());
        match &mut self.kind {
            StepKind::Subprocess(_) => {}
            StepKind::Function(s) => s.pre_process(base, registry)?,
            StepKind::Assertion(s) => s.pre_process(base, registry)?,
        }
        self.state = StepState::PreProcessed;
        Ok(())
    }

    /// Run the step body
    pub async fn execute(&mut self) -> Result<StepOutput> {
        if self.state != StepState::PreProcessed {
            return Err(Error::invalid_step_state("execute", self.state));
        }
        let Some(context) = &self.context else {
            return Err(Error::invalid_step_state("execute", "not loaded"));
        };
        let output = match &self.kind {
            StepKind::Subprocess(s) => s.execute(context).await,
            StepKind::Function(s) => s.execute(context).await?,
            StepKind::Assertion(s) => s.evaluate()?,
        };
        self.state = StepState::Ran;
        Ok(output)
    }

    pub fn post_process(&mut self, output: StepOutput) -> StepOutput {
        self.state = StepState::Complete;
        output
    }

    /// Load, resolve, execute and post-process with the default parsers
    pub async fn run(&mut self, step_number: usize, run_dir: &Path) -> StepOutput {
        self.run_with(step_number, run_dir, &ParserRegistry::default())
            .await
    }

    /// Like [`Step::run`] with an explicit parser registry
    pub async fn run_with(
        &mut self,
        step_number: usize,
        run_dir: &Path,
        registry: &ParserRegistry,
    ) -> StepOutput {
        match self.drive(step_number, run_dir, registry).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(step = step_number, error = %e, "Step errored");
                StepOutput::error(e.to_string())
            }
        }
    }

    async fn drive(
        &mut self,
        step_number: usize,
        run_dir: &Path,
        registry: &ParserRegistry,
    ) -> Result<StepOutput> {
        self.load(step_number, run_dir)?;
        self.pre_process(registry)?;
        let output = self.execute().await?;
        Ok(self.post_process(output))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
