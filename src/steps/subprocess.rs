//! External command steps

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::{StepContext, StepOutput};
use crate::common::{Error, Result};

/// Exit codes meaning "the check ran and failed" unless configured otherwise
pub const DEFAULT_FAIL_CODES: [i32; 1] = [1];

/// Runs a command from the run directory
///
/// Exit code 0 passes, codes in `fail_codes` fail, anything else errors.
#[derive(Debug, Clone, PartialEq)]
pub struct SubprocessStep {
    command: Vec<String>,
    timeout: Option<Duration>,
    fail_codes: Vec<i32>,
}

impl SubprocessStep {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::InvalidOperation(
                "subprocess step needs a command".to_string(),
            ));
        }
        Ok(Self {
            command,
            timeout: None,
            fail_codes: DEFAULT_FAIL_CODES.to_vec(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fail_codes(mut self, codes: Vec<i32>) -> Self {
        self.fail_codes = codes;
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn program(&self) -> std::result::Result<PathBuf, String> {
        let name = &self.command[0];
        if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            return Ok(PathBuf::from(name));
        }
        which::which(name).map_err(|e| format!("Command '{name}' not found: {e}"))
    }

    pub async fn execute(&self, ctx: &StepContext) -> StepOutput {
        let program = match self.program() {
            Ok(p) => p,
            Err(msg) => return StepOutput::error(msg),
        };

        let mut cmd = Command::new(&program);
        cmd.args(&self.command[1..])
            .current_dir(&ctx.run_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(step = ctx.step_number, command = ?self.command, "Spawning subprocess");

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return StepOutput::error(format!(
                        "Command {:?} timed out after {} seconds",
                        self.command,
                        limit.as_secs_f64()
                    ))
                }
            },
            None => cmd.output().await,
        };
        let output = match result {
            Ok(o) => o,
            Err(e) => {
                return StepOutput::error(format!("Failed to run {:?}: {e}", self.command))
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        match output.status.code() {
            Some(0) => StepOutput::pass(text),
            Some(code) if self.fail_codes.contains(&code) => StepOutput::fail(text),
            Some(code) => {
                tracing::debug!(step = ctx.step_number, code, "Unexpected exit code");
                StepOutput::error(text)
            }
            None => StepOutput::error(format!("{text}Terminated by signal")),
        }
    }
}

impl fmt::Display for SubprocessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = serde_json::to_string(&self.command).map_err(|_| fmt::Error)?;
        match self.timeout {
            Some(t) => write!(f, "SubprocessStep({command}, timeout={:?})", t.as_secs_f64()),
            None => write!(f, "SubprocessStep({command})"),
        }
    }
}
