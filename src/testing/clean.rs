//! Removing old run directories

use std::io::{BufRead, Write};
use std::path::PathBuf;

use super::runs::{find_relevant_test_runs, RunFilter};
use crate::common::Result;

/// Deletes the runs matching a filter after confirmation
#[derive(Debug, Clone)]
pub struct CleanRunner {
    runs_dir: PathBuf,
    filter: RunFilter,
    force: bool,
}

impl CleanRunner {
    pub fn new(runs_dir: impl Into<PathBuf>, filter: RunFilter) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            filter,
            force: false,
        }
    }

    /// Skip the confirmation prompt
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Remove matching runs, returning how many were removed
    ///
    /// Without `force` the answer is read from `input`; anything other than
    /// `y` or `yes` cancels.
    pub fn run(&self, mut input: impl BufRead, out: &mut impl Write) -> Result<usize> {
        let runs = find_relevant_test_runs(&self.runs_dir, &self.filter)?;
        if runs.is_empty() {
            writeln!(
                out,
                "Couldn't find any test runs to remove in {} based on given criteria",
                self.runs_dir.display()
            )?;
            return Ok(0);
        }

        if !self.force {
            writeln!(out, "The following test runs will be removed:")?;
            for run in &runs {
                writeln!(out, "  {}", run.display())?;
            }
            write!(out, "Remove {} test runs? [y/N] ", runs.len())?;
            out.flush()?;

            let mut answer = String::new();
            input.read_line(&mut answer)?;
            if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
                writeln!(out, "Test run removal canceled")?;
                return Ok(0);
            }
        }

        for run in &runs {
            std::fs::remove_dir_all(run)?;
            tracing::debug!(run = %run.display(), "Removed test run");
        }
        writeln!(out, "{} old test runs have been removed", runs.len())?;
        Ok(runs.len())
    }
}
