//! Filesystem layout and platform directories
//!
//! Names of the files and directories that make up a test and a test run,
//! plus the settings and data locations from the directories crate.

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the platform config and data directories
const APP_NAME: &str = "hyalus";

/// Test configuration file, present in tests and copied into runs
pub const CONFIG_FILE: &str = "config.yaml";

/// Read-only fixtures of a test
pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";
pub const TMP_DIR: &str = "tmp";

/// Internal tooling directory inside a run
pub const HYALUS_DIR: &str = "hyalus";

/// Run log, relative to the run directory
pub const RUN_LOG: &str = "hyalus/hyalus.log";

/// Run metadata, relative to the run directory
pub const RUN_METADATA: &str = "hyalus/run_metadata.json";

/// Extension of suite files
pub const SUITE_EXT: &str = "ste";

/// Comment marker inside suite files
pub const SUITE_COMMENT: &str = "#";

/// Subdirectories every run directory contains
pub const RUN_SUBDIRS: [&str; 4] = [INPUT_DIR, OUTPUT_DIR, TMP_DIR, HYALUS_DIR];

/// Date format used in run names
pub const DATE_FMT: &str = "%Y-%m-%d";

/// Timestamp format used in run metadata
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Every file and directory a complete run directory must hold
pub fn expected_run_objects(run_dir: &Path) -> Vec<PathBuf> {
    let mut objs: Vec<PathBuf> = RUN_SUBDIRS.iter().map(|d| run_dir.join(d)).collect();
    objs.push(run_dir.join(CONFIG_FILE));
    objs.push(run_dir.join(RUN_METADATA));
    objs.push(run_dir.join(RUN_LOG));
    objs
}

/// Resolve a possibly relative path against a base directory
pub fn resolve_against(path: &Path, base: Option<&Path>) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/hyalus/`
/// - macOS: `~/Library/Application Support/hyalus/`
/// - Windows: `%APPDATA%\hyalus\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the settings file
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("settings.toml"))
}

/// Default location for run directories
pub fn default_runs_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().join("runs"))
        .unwrap_or_else(|| PathBuf::from("hyalus_runs"))
}

/// Changes the process working directory and restores the previous one on drop
///
/// Restoration happens on every exit path, including early returns and
/// unwinding panics.
#[derive(Debug)]
pub struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    /// Switch to `dir`, remembering the current directory
    pub fn change_to(dir: &Path) -> io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { previous })
    }

    /// Directory that will be restored
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(dir = %self.previous.display(), error = %e, "Failed to restore working directory");
        }
    }
}
