//! Running steps around an arbitrary action
//!
//! [`StepHarness`] lets library users reuse steps outside a test directory:
//! the steps prepare a run directory, then the wrapped action runs inside it.
//!
//! ```no_run
//! # async fn demo() -> hyalus::Result<()> {
//! use hyalus::steps::{Step, SubprocessStep};
//! use hyalus::testing::StepHarness;
//!
//! let listing = StepHarness::new()
//!     .step(Step::new(SubprocessStep::new(vec!["touch".into(), "output/a".into()])?))
//!     .wrap(|dir| std::fs::read_dir(dir.join("output")).map(|d| d.count()))
//!     .call()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::runs::create_run_subdirs;
use crate::common::paths::CwdGuard;
use crate::common::{Error, Result};
use crate::parse::ParserRegistry;
use crate::steps::Step;

/// Steps to run before an action
#[derive(Debug, Default)]
pub struct StepHarness {
    steps: Vec<Step>,
    dir: Option<PathBuf>,
    parsers: Arc<ParserRegistry>,
}

impl StepHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Use `dir` as the run directory instead of a temporary one
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn parsers(mut self, parsers: Arc<ParserRegistry>) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn wrap<F, T>(self, action: F) -> HarnessedAction<F>
    where
        F: FnOnce(&Path) -> T,
    {
        HarnessedAction {
            harness: self,
            action,
        }
    }
}

/// An action bound to the steps that prepare it
#[derive(Debug)]
pub struct HarnessedAction<F> {
    harness: StepHarness,
    action: F,
}

impl<F, T> HarnessedAction<F>
where
    F: FnOnce(&Path) -> T,
{
    /// Run every step, then the action with the run directory as cwd
    pub async fn call(self) -> Result<T> {
        let StepHarness {
            mut steps,
            dir,
            parsers,
        } = self.harness;

        // The temporary dir lives until the action returns
        let (run_dir, _tmp): (PathBuf, Option<TempDir>) = match dir {
            Some(dir) => (dir, None),
            None => {
                let tmp = tempfile::tempdir()?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };
        create_run_subdirs(&run_dir)?;

        for (i, step) in steps.iter_mut().enumerate() {
            let number = i + 1;
            let output = step.run_with(number, &run_dir, &parsers).await;
            if !output.passed() {
                return Err(Error::HarnessStep {
                    number,
                    output: output.output,
                });
            }
        }

        let _cwd = CwdGuard::change_to(&run_dir)?;
        Ok((self.action)(&run_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::paths::test_support::cwd_lock;
    use crate::common::paths::OUTPUT_DIR;
    use crate::steps::{AssertionKind, AssertionStep, SubprocessStep};
    use serde_json::json;

    #[cfg(unix)]
    fn write_marker() -> Step {
        let command = ["sh", "-c", "printf ready > output/marker.txt"];
        Step::new(SubprocessStep::new(command.map(String::from).to_vec()).unwrap())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_action_runs_in_prepared_dir() {
        let _lock = cwd_lock();
        let before = std::env::current_dir().unwrap();

        let (dir, content) = StepHarness::new()
            .step(write_marker())
            .wrap(|dir| {
                let cwd = std::env::current_dir().unwrap();
                assert_eq!(cwd.canonicalize().unwrap(), dir.canonicalize().unwrap());
                (dir.to_path_buf(), std::fs::read_to_string("output/marker.txt").unwrap())
            })
            .call()
            .await
            .unwrap();

        assert_eq!(content, "ready");
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_failing_step_stops_before_action() {
        let tmp = tempfile::tempdir().unwrap();
        let ne = AssertionStep::new(AssertionKind::Eq, vec![json!(1), json!(2)]).unwrap();

        let mut called = false;
        let err = StepHarness::new()
            .in_dir(tmp.path())
            .step(Step::new(ne))
            .wrap(|_| called = true)
            .call()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HarnessStep { number: 1, .. }));
        assert!(!called);
        assert!(tmp.path().join(OUTPUT_DIR).is_dir());
    }
}
