//! Run directories: naming, creation and lookup
//!
//! Every test run gets its own directory named
//! `{test_name}_{YYYY-MM-DD}_{suffix}` under the runs directory.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::TestConfig;
use super::discovery::TestDir;
use super::tags::TagOp;
use crate::common::paths::{
    expected_run_objects, CONFIG_FILE, DATETIME_FMT, DATE_FMT, RUN_METADATA, RUN_SUBDIRS,
};
use crate::common::{Error, Result};

/// Suffix length for new run directories
pub const DEFAULT_SUFFIX_LEN: usize = 8;

/// Attempts at a unique run directory name before giving up
pub const MAX_RUN_DIR_ATTEMPTS: usize = 64;

/// Parts of a run directory name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunName {
    pub test_name: String,
    pub date: NaiveDate,
    pub suffix: String,
}

impl RunName {
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || Error::InvalidRunName(name.to_string());
        let mut parts = name.rsplitn(3, '_');
        let (Some(suffix), Some(date), Some(test_name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if test_name.is_empty()
            || suffix.is_empty()
            || !suffix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(date, DATE_FMT).map_err(|_| invalid())?;
        Ok(Self {
            test_name: test_name.to_string(),
            date,
            suffix: suffix.to_string(),
        })
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.test_name,
            self.date.format(DATE_FMT),
            self.suffix
        )
    }
}

/// A run directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestRun {
    path: PathBuf,
}

impl TestRun {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse_name(&self) -> Result<RunName> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        RunName::parse(&name)
    }

    /// Well-named and holds every expected file and directory
    pub fn is_valid(&self) -> bool {
        self.parse_name().is_ok() && expected_run_objects(&self.path).iter().all(|p| p.exists())
    }

    /// Run date lies within the inclusive bounds
    pub fn within_date_range(&self, oldest: Option<NaiveDate>, newest: Option<NaiveDate>) -> bool {
        let Ok(name) = self.parse_name() else {
            return false;
        };
        oldest.map_or(true, |d| name.date >= d) && newest.map_or(true, |d| name.date <= d)
    }

    /// Tag filter against the config copied into the run
    pub fn matches_tags<S: AsRef<str>>(&self, tags: &[S], op: TagOp) -> bool {
        match TestConfig::load(&self.path.join(CONFIG_FILE)) {
            Ok(config) => op.matches(&config.tag_names(), tags),
            Err(_) => false,
        }
    }
}

/// Criteria for selecting old runs
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Test names; empty selects runs of every test
    pub test_names: Vec<String>,
    /// Tags; empty skips the tag filter
    pub tags: Vec<String>,
    pub tag_op: TagOp,
    pub oldest: Option<NaiveDate>,
    pub newest: Option<NaiveDate>,
}

/// Valid runs in `runs_dir`, limited to the given tests when any are named
pub fn find_test_runs<S: AsRef<str>>(runs_dir: &Path, names: &[S]) -> Result<BTreeSet<PathBuf>> {
    let mut found = BTreeSet::new();
    if !runs_dir.is_dir() {
        return Ok(found);
    }
    for entry in std::fs::read_dir(runs_dir)? {
        let run = TestRun::new(entry?.path());
        if !run.is_valid() {
            continue;
        }
        let Ok(name) = run.parse_name() else {
            continue;
        };
        if names.is_empty() || names.iter().any(|n| n.as_ref() == name.test_name) {
            found.insert(run.path);
        }
    }
    Ok(found)
}

/// Runs passing the name, tag and date filters
pub fn find_relevant_test_runs(runs_dir: &Path, filter: &RunFilter) -> Result<BTreeSet<PathBuf>> {
    Ok(find_test_runs(runs_dir, &filter.test_names)?
        .into_iter()
        .filter(|p| {
            let run = TestRun::new(p);
            (filter.tags.is_empty() || run.matches_tags(&filter.tags, filter.tag_op))
                && run.within_date_range(filter.oldest, filter.newest)
        })
        .collect())
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Create a fresh run directory for `test`
///
/// A name collision retries with a suffix one shorter, never below one
/// character, up to [`MAX_RUN_DIR_ATTEMPTS`] times.
pub fn make_run_dir(test: &TestDir, runs_dir: &Path, suffix_len: usize) -> Result<PathBuf> {
    make_run_dir_with(test, runs_dir, suffix_len, random_suffix)
}

/// [`make_run_dir`] drawing suffixes of the requested length from `suffix`
pub fn make_run_dir_with<F>(
    test: &TestDir,
    runs_dir: &Path,
    suffix_len: usize,
    mut suffix: F,
) -> Result<PathBuf>
where
    F: FnMut(usize) -> String,
{
    std::fs::create_dir_all(runs_dir)?;
    let date = Local::now().date_naive();
    let mut len = suffix_len.max(1);

    for _ in 0..MAX_RUN_DIR_ATTEMPTS {
        let name = RunName {
            test_name: test.name(),
            date,
            suffix: suffix(len),
        };
        let path = runs_dir.join(name.to_string());
        match std::fs::create_dir(&path) {
            Ok(()) => {
                create_run_subdirs(&path)?;
                tracing::debug!(run_dir = %path.display(), "Created run directory");
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(run_dir = %path.display(), "Run directory exists, retrying");
                len = len.saturating_sub(1).max(1);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::RunDirCollision(test.name()))
}

/// Create missing run subdirectories; existing ones are left as they are
pub fn create_run_subdirs(run_dir: &Path) -> Result<()> {
    for dir in RUN_SUBDIRS {
        std::fs::create_dir_all(run_dir.join(dir))?;
    }
    Ok(())
}

/// Contents of `hyalus/run_metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub run_start: String,
}

pub fn write_run_metadata(run_dir: &Path) -> Result<PathBuf> {
    let metadata = RunMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        run_start: Local::now().format(DATETIME_FMT).to_string(),
    };
    let path = run_dir.join(RUN_METADATA);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&metadata)?)?;
    Ok(path)
}

pub fn read_run_metadata(run_dir: &Path) -> Result<RunMetadata> {
    let path = run_dir.join(RUN_METADATA);
    let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
    Ok(serde_json::from_str(&content)?)
}
