//! Persistent user settings
//!
//! Settings live in a TOML file under the platform config directory. Each
//! setting can be updated from a string or reset to its default by name.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::{default_runs_dir, settings_path};
use super::{Error, Result};
use crate::testing::TagOp;

/// Names accepted by [`SettingsStore::update`] and [`SettingsStore::reset`]
pub const SETTING_NAMES: [&str; 7] = [
    "runs_dir",
    "search_dirs",
    "tag_operator",
    "force_clean",
    "stdout",
    "debug",
    "config_author",
];

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Where run directories are created
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,

    /// Directories searched for tests and suite files, after the cwd
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,

    /// How multiple tags combine when selecting tests
    #[serde(default)]
    pub tag_operator: TagOp,

    /// Skip the confirmation prompt when cleaning runs
    #[serde(default)]
    pub force_clean: bool,

    /// Log to stdout in addition to run logs
    #[serde(default = "default_stdout")]
    pub stdout: bool,

    /// Log at DEBUG level
    #[serde(default)]
    pub debug: bool,

    /// Author written into new test configs
    #[serde(default)]
    pub config_author: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runs_dir: default_runs_dir(),
            search_dirs: Vec::new(),
            tag_operator: TagOp::default(),
            force_clean: false,
            stdout: default_stdout(),
            debug: false,
            config_author: String::new(),
        }
    }
}

fn default_stdout() -> bool {
    true
}

/// Settings bound to the file they are loaded from and saved to
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`
    ///
    /// Returns default settings if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            settings,
        })
    }

    /// Load settings from the platform settings file
    pub fn load_default() -> Result<Self> {
        let path = settings_path()
            .ok_or_else(|| Error::invalid_setting("settings", "no home directory available"))?;
        Self::load(&path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Write settings back to their file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.settings)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Set a setting from its string form
    ///
    /// Lists are comma-separated. Directories must already exist.
    pub fn update(&mut self, name: &str, raw: &str) -> Result<()> {
        let raw = raw.trim();
        match name {
            "runs_dir" => {
                self.settings.runs_dir = existing_dir(name, raw)?;
            }
            "search_dirs" => {
                self.settings.search_dirs = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| existing_dir(name, s))
                    .collect::<Result<_>>()?;
            }
            "tag_operator" => {
                self.settings.tag_operator = raw
                    .parse()
                    .map_err(|e: String| Error::invalid_setting(name, e))?;
            }
            "force_clean" => self.settings.force_clean = parse_bool(name, raw)?,
            "stdout" => self.settings.stdout = parse_bool(name, raw)?,
            "debug" => self.settings.debug = parse_bool(name, raw)?,
            "config_author" => self.settings.config_author = raw.to_string(),
            _ => return Err(unknown_setting(name)),
        }
        tracing::debug!(setting = name, value = raw, "Updated setting");
        Ok(())
    }

    /// Restore a setting to its default
    pub fn reset(&mut self, name: &str) -> Result<()> {
        let defaults = Settings::default();
        match name {
            "runs_dir" => self.settings.runs_dir = defaults.runs_dir,
            "search_dirs" => self.settings.search_dirs = defaults.search_dirs,
            "tag_operator" => self.settings.tag_operator = defaults.tag_operator,
            "force_clean" => self.settings.force_clean = defaults.force_clean,
            "stdout" => self.settings.stdout = defaults.stdout,
            "debug" => self.settings.debug = defaults.debug,
            "config_author" => self.settings.config_author = defaults.config_author,
            _ => return Err(unknown_setting(name)),
        }
        Ok(())
    }

    /// One `name = value` line per setting
    pub fn describe(&self) -> String {
        let s = &self.settings;
        let search_dirs = s
            .search_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        [
            format!("runs_dir = {}", s.runs_dir.display()),
            format!("search_dirs = {search_dirs}"),
            format!("tag_operator = {}", s.tag_operator),
            format!("force_clean = {}", s.force_clean),
            format!("stdout = {}", s.stdout),
            format!("debug = {}", s.debug),
            format!("config_author = {}", s.config_author),
        ]
        .join("\n")
    }
}

fn unknown_setting(name: &str) -> Error {
    Error::invalid_setting(
        name,
        format!("unknown setting, expected one of: {}", SETTING_NAMES.join(", ")),
    )
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(Error::invalid_setting(name, format!("'{raw}' is not a boolean"))),
    }
}

fn existing_dir(name: &str, raw: &str) -> Result<PathBuf> {
    let path = PathBuf::from(raw);
    if !path.is_dir() {
        return Err(Error::invalid_setting(
            name,
            format!("'{raw}' is not an existing directory"),
        ));
    }
    Ok(std::path::absolute(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(&tmp.path().join("settings.toml")).unwrap();
        assert_eq!(store.settings(), &Settings::default());
        assert!(store.settings().stdout);
    }

    #[test]
    fn test_update_save_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("settings.toml");
        let mut store = SettingsStore::load(&path).unwrap();

        store.update("tag_operator", "all").unwrap();
        store.update("force_clean", "yes").unwrap();
        store
            .update("search_dirs", &format!("{}, ", tmp.path().display()))
            .unwrap();
        store.update("config_author", "Jane").unwrap();
        store.save().unwrap();

        let loaded = SettingsStore::load(&path).unwrap();
        assert_eq!(loaded.settings().tag_operator, TagOp::All);
        assert!(loaded.settings().force_clean);
        assert_eq!(loaded.settings().search_dirs, vec![tmp.path().to_path_buf()]);
        assert_eq!(loaded.settings().config_author, "Jane");
    }

    #[test]
    fn test_update_rejects_bad_values() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(&tmp.path().join("s.toml")).unwrap();

        assert!(matches!(
            store.update("force_clean", "maybe"),
            Err(Error::InvalidSetting { .. })
        ));
        assert!(matches!(
            store.update("runs_dir", "/definitely/not/here"),
            Err(Error::InvalidSetting { .. })
        ));
        assert!(matches!(
            store.update("tag_operator", "xor"),
            Err(Error::InvalidSetting { .. })
        ));
        assert!(matches!(
            store.update("colour", "red"),
            Err(Error::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(&tmp.path().join("s.toml")).unwrap();
        store.update("debug", "true").unwrap();
        store.reset("debug").unwrap();
        assert!(!store.settings().debug);
        assert!(store.reset("nope").is_err());
    }

    #[test]
    fn test_describe_lists_every_setting() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(&tmp.path().join("s.toml")).unwrap();
        let text = store.describe();
        for name in SETTING_NAMES {
            assert!(text.contains(&format!("{name} = ")), "missing {name}");
        }
    }
}
