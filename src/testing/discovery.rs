//! Finding tests by name, suite file and tag
//!
//! Names are looked up in the current directory first, then in each search
//! directory. A name must identify exactly one filesystem object.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use super::config::TestConfig;
use super::runs::RunName;
use super::tags::TagOp;
use crate::common::paths::{CONFIG_FILE, INPUT_DIR, SUITE_COMMENT, SUITE_EXT};
use crate::common::{Error, Result};

/// A directory holding a test config
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.path.join(INPUT_DIR)
    }

    /// Has a config and is not itself a run directory
    pub fn is_valid(&self) -> bool {
        self.config_path().is_file() && RunName::parse(&self.name()).is_err()
    }

    pub fn load_config(&self) -> Result<TestConfig> {
        TestConfig::load(&self.config_path())
    }

    /// Tag filter; tests without a loadable config never match
    pub fn matches_tags<S: AsRef<str>>(&self, tags: &[S], op: TagOp) -> bool {
        match self.load_config() {
            Ok(config) => op.matches(&config.tag_names(), tags),
            Err(e) => {
                tracing::debug!(test = %self.path.display(), error = %e, "Skipping test with bad config");
                false
            }
        }
    }
}

/// Locate the single object called `name`
///
/// Absolute names are checked as-is. Hits are canonicalized so the same
/// object reached through two directories counts once.
pub fn find_fs_obj(name: &str, search_dirs: &[PathBuf]) -> Result<PathBuf> {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return match candidate.canonicalize() {
            Ok(path) => Ok(path),
            Err(_) => Err(Error::not_found(name, &[name])),
        };
    }

    let mut dirs = Vec::with_capacity(search_dirs.len() + 1);
    dirs.push(std::env::current_dir()?);
    dirs.extend(search_dirs.iter().cloned());

    let mut hits: Vec<PathBuf> = Vec::new();
    for dir in &dirs {
        let path = dir.join(candidate);
        if let Ok(path) = path.canonicalize() {
            if !hits.contains(&path) {
                hits.push(path);
            }
        }
    }

    match hits.len() {
        0 => {
            let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
            Err(Error::not_found(name, &searched))
        }
        1 => Ok(hits.remove(0)),
        _ => Err(Error::duplicate(name, &hits)),
    }
}

/// Entries of a `.ste` suite file, skipping blanks and comments
pub fn parse_test_suite(path: &Path) -> Result<Vec<String>> {
    if path.extension().and_then(|e| e.to_str()) != Some(SUITE_EXT) {
        return Err(Error::invalid_suite(path, "suite files must have the .ste extension"));
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(SUITE_COMMENT))
        .map(str::to_string)
        .collect())
}

/// Tests named directly or through suite files, recursively
pub fn find_tests_by_name<S: AsRef<str>>(
    names: &[S],
    search_dirs: &[PathBuf],
) -> Result<BTreeSet<PathBuf>> {
    let mut found = BTreeSet::new();
    let mut visited = HashSet::new();
    for name in names {
        collect_named(name.as_ref(), search_dirs, &mut found, &mut visited)?;
    }
    Ok(found)
}

fn collect_named(
    name: &str,
    search_dirs: &[PathBuf],
    found: &mut BTreeSet<PathBuf>,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    let path = find_fs_obj(name, search_dirs)?;
    if path.is_dir() {
        found.insert(path);
        return Ok(());
    }
    if path.extension().and_then(|e| e.to_str()) != Some(SUITE_EXT) {
        return Err(Error::invalid_suite(
            &path,
            "expected a test directory or a .ste suite file",
        ));
    }
    if !visited.insert(path.clone()) {
        tracing::debug!(suite = %path.display(), "Suite already expanded");
        return Ok(());
    }
    for entry in parse_test_suite(&path)? {
        collect_named(&entry, search_dirs, found, visited)?;
    }
    Ok(())
}

/// Valid tests directly inside the search directories
pub fn find_all_tests(search_dirs: &[PathBuf]) -> Result<BTreeSet<PathBuf>> {
    let mut found = BTreeSet::new();
    for dir in search_dirs {
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "Search directory does not exist");
            continue;
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() && TestDir::new(&path).is_valid() {
                found.insert(path.canonicalize()?);
            }
        }
    }
    Ok(found)
}

/// Tests whose tags satisfy `op`; no tags selects nothing
pub fn find_tests_by_tag<S: AsRef<str>>(
    tags: &[S],
    op: TagOp,
    search_dirs: &[PathBuf],
) -> Result<BTreeSet<PathBuf>> {
    if tags.is_empty() {
        return Ok(BTreeSet::new());
    }
    Ok(find_all_tests(search_dirs)?
        .into_iter()
        .filter(|p| TestDir::new(p).matches_tags(tags, op))
        .collect())
}
