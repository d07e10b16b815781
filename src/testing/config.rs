//! Test configuration loading
//!
//! A test is configured by a `config.yaml` holding a description, a note on
//! its input data, classification tags and an ordered list of steps.
//! Loading validates the file in stages and reports the first stage that
//! failed as a [`ConfigStatus`].

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::tags::{Tag, TagSpec, TagType};
use crate::common::{ConfigStatus, Error, Result};
use crate::steps::{
    AssertionKind, AssertionStep, FunctionRegistry, FunctionStep, Step, SubprocessStep,
};

/// Top-level keys every config must define
pub const REQUIRED_FIELDS: [&str; 4] = ["description", "input_data", "steps", "tags"];

/// A step as written in the config
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    /// `subprocess`, `run_function` or one of the `assert_*` actions
    pub action: String,

    /// Command vector for `subprocess`
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Registered function name for `run_function`
    #[serde(default)]
    pub function: Option<String>,

    #[serde(default)]
    pub args: Vec<JsonValue>,

    #[serde(default)]
    pub kwargs: IndexMap<String, JsonValue>,

    /// Seconds before the step is abandoned
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Exit codes meaning FAIL rather than ERROR
    #[serde(default)]
    pub fail_codes: Option<Vec<i32>>,

    #[serde(default)]
    pub halt_on_failure: bool,

    /// Earlier step numbers that must pass first
    #[serde(default)]
    pub needs: Option<Vec<usize>>,
}

impl StepSpec {
    /// Validate the spec as step `number` (1-based)
    pub fn check(&self, number: usize) -> std::result::Result<(), String> {
        match self.action.as_str() {
            "subprocess" => match &self.command {
                Some(cmd) if !cmd.is_empty() => {}
                _ => return Err(format!("step {number}: subprocess needs a non-empty command")),
            },
            "run_function" => {
                if self.function.is_none() {
                    return Err(format!("step {number}: run_function needs a function name"));
                }
            }
            action => {
                let kind = AssertionKind::from_action(action)
                    .ok_or_else(|| format!("step {number}: unknown action '{action}'"))?;
                if !kind.is_variadic() && self.args.len() != 2 {
                    return Err(format!(
                        "step {number}: {action} takes exactly 2 args, got {}",
                        self.args.len()
                    ));
                }
            }
        }
        if let Some(t) = self.timeout {
            if !t.is_finite() || t <= 0.0 {
                return Err(format!("step {number}: timeout must be a positive number of seconds"));
            }
        }
        if let Some(needs) = &self.needs {
            if let Some(bad) = needs.iter().find(|n| **n == 0 || **n >= number) {
                return Err(format!(
                    "step {number}: needs refers to step {bad}, which does not run before it"
                ));
            }
        }
        Ok(())
    }

    /// Build the runnable step
    pub fn build(&self, functions: &FunctionRegistry) -> Result<Step> {
        let timeout = self
            .timeout
            .map(Duration::try_from_secs_f64)
            .transpose()
            .map_err(|e| Error::InvalidOperation(format!("invalid timeout: {e}")))?;
        let step = match self.action.as_str() {
            "subprocess" => {
                let mut step = SubprocessStep::new(self.command.clone().unwrap_or_default())?;
                if let Some(t) = timeout {
                    step = step.with_timeout(t);
                }
                if let Some(codes) = &self.fail_codes {
                    step = step.with_fail_codes(codes.clone());
                }
                Step::new(step)
            }
            "run_function" => {
                let name = self.function.as_deref().unwrap_or_default();
                let mut step = FunctionStep::from_registry(functions, name)?
                    .args(self.args.iter().cloned());
                for (k, v) in &self.kwargs {
                    step = step.kwarg(k.clone(), v.clone());
                }
                if let Some(t) = timeout {
                    step = step.with_timeout(t);
                }
                Step::new(step)
            }
            action => {
                let kind = AssertionKind::from_action(action)
                    .ok_or_else(|| Error::InvalidOperation(format!("unknown action '{action}'")))?;
                Step::new(AssertionStep::new(kind, self.args.clone())?)
            }
        };
        let step = step.with_halt_on_failure(self.halt_on_failure);
        Ok(match &self.needs {
            Some(needs) => step.with_needs(needs.clone()),
            None => step,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    description: String,
    input_data: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_on: Option<String>,
    tags: Vec<TagSpec>,
    steps: Vec<StepSpec>,
}

/// A validated test configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    pub description: String,
    pub input_data: String,
    pub author: Option<String>,
    pub created_on: Option<String>,
    pub steps: Vec<StepSpec>,
    pub tags: Vec<Tag>,
}

impl TestConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::invalid_config(
                ConfigStatus::NotFound,
                path.display().to_string(),
            ));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::invalid_config(ConfigStatus::CouldNotBeLoaded, e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Validate config text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| Error::invalid_config(ConfigStatus::CouldNotBeLoaded, e.to_string()))?;
        let Some(mapping) = doc.as_mapping() else {
            return Err(Error::invalid_config(
                ConfigStatus::CouldNotBeLoaded,
                "top level must be a mapping",
            ));
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|f| !mapping.contains_key(*f))
            .collect();
        if !missing.is_empty() {
            return Err(Error::invalid_config(
                ConfigStatus::MissingFields,
                format!("Missing: {}", missing.join(", ")),
            ));
        }

        let raw: RawConfig = serde_yaml::from_value(doc)
            .map_err(|e| Error::invalid_config(ConfigStatus::InvalidFields, e.to_string()))?;

        let tags: Vec<Tag> = raw.tags.into_iter().map(Tag::from).collect();
        if !tags.iter().any(|t| t.tag_type == TagType::Runtime) {
            return Err(Error::invalid_config(
                ConfigStatus::InvalidFields,
                format!("Missing tags with type: {}", TagType::Runtime),
            ));
        }

        for (i, step) in raw.steps.iter().enumerate() {
            step.check(i + 1)
                .map_err(|e| Error::invalid_config(ConfigStatus::InvalidFields, e))?;
        }

        Ok(Self {
            description: raw.description,
            input_data: raw.input_data,
            author: raw.author,
            created_on: raw.created_on,
            steps: raw.steps,
            tags,
        })
    }

    /// Turn every step spec into a runnable step
    pub fn build_steps(&self, functions: &FunctionRegistry) -> Result<Vec<Step>> {
        self.steps.iter().map(|s| s.build(functions)).collect()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}
