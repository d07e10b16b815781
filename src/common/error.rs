//! Error types for hyalus
//!
//! Discovery errors are surfaced to callers as-is. Errors raised while a step
//! resolves its arguments are turned into an ERROR step output by the step
//! driver, so their messages double as step output.

use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a test configuration was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    NotFound,
    CouldNotBeLoaded,
    MissingFields,
    InvalidFields,
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigStatus::NotFound => "Config file could not be found",
            ConfigStatus::CouldNotBeLoaded => "Config file could not be loaded",
            ConfigStatus::MissingFields => "Config file is missing required fields",
            ConfigStatus::InvalidFields => "Config file has invalid fields",
        };
        f.write_str(msg)
    }
}

/// Main error type for hyalus
#[derive(Error, Debug)]
pub enum Error {
    // === Discovery Errors ===
    #[error("Could not find item {item} in directories: {searched}")]
    NotFound { item: String, searched: String },

    #[error("Found multiple items with name {item}: {locations}")]
    Duplicate { item: String, locations: String },

    #[error("Invalid test suite '{path}': {reason}")]
    InvalidTestSuite { path: String, reason: String },

    #[error("No tests found to run")]
    NoTestsFound,

    // === Lookup Errors ===
    #[error("Wildcard '{pattern}' matched {count} files, expected exactly one")]
    InvalidWildcard { pattern: String, count: usize },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // === Parse Errors ===
    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },

    // === Configuration Errors ===
    #[error("{status}: {details}")]
    InvalidConfig { status: ConfigStatus, details: String },

    #[error("Invalid run name '{0}', expected <test>_<YYYY-MM-DD>_<suffix>")]
    InvalidRunName(String),

    #[error("Unknown function '{0}'. Register it with FunctionRegistry::register")]
    UnknownFunction(String),

    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting { name: String, reason: String },

    // === Execution Errors ===
    #[error("Cannot {action} a step that is {state}")]
    InvalidStepState { action: String, state: String },

    #[error("Could not create a unique run directory for '{0}'")]
    RunDirCollision(String),

    #[error("Step {number} did not pass: {output}")]
    HarnessStep { number: usize, output: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid settings file: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Could not serialize settings: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Delimited file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Create a not found error listing every directory that was searched
    pub fn not_found<S: AsRef<str>>(item: &str, searched: &[S]) -> Self {
        Self::NotFound {
            item: item.to_string(),
            searched: searched.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create a duplicate error naming every location
    pub fn duplicate(item: &str, locations: &[impl AsRef<Path>]) -> Self {
        Self::Duplicate {
            item: item.to_string(),
            locations: locations
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create an invalid test suite error
    pub fn invalid_suite(path: &Path, reason: &str) -> Self {
        Self::InvalidTestSuite {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a parse error for a file
    pub fn parse(path: &Path, reason: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a config error with the given status
    pub fn invalid_config(status: ConfigStatus, details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            status,
            details: details.into(),
        }
    }

    /// Create an invalid setting error
    pub fn invalid_setting(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid step state error
    pub fn invalid_step_state(action: &str, state: impl fmt::Display) -> Self {
        Self::InvalidStepState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &Path, error: impl fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
