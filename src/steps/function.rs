//! Steps calling registered Rust functions
//!
//! Functions are looked up by name in a [`FunctionRegistry`], but never run
//! inside the driving process. A [`FunctionStep`] sends a
//! [`FunctionRequest`] to a host process, by default the running executable
//! with the hidden `run-function` subcommand, which answers it with
//! [`serve`]. A crashing, overflowing or timed-out function only takes its
//! own step down.
//!
//! Host exit codes: 0 passes with stdout as the output, 1 fails, anything
//! else errors.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{StepContext, StepOutput};
use crate::common::{Error, Result};
use crate::parse::json::json_write;
use crate::parse::ParserRegistry;
use crate::resolve::resolve;
use crate::value::Value;

/// Why a step function did not succeed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    /// A check inside the function did not hold
    #[error("{0}")]
    Assertion(String),

    #[error("{0}")]
    Failed(String),
}

impl From<Error> for FunctionError {
    fn from(e: Error) -> Self {
        FunctionError::Failed(e.to_string())
    }
}

impl From<std::io::Error> for FunctionError {
    fn from(e: std::io::Error) -> Self {
        FunctionError::Failed(e.to_string())
    }
}

pub type FunctionResult = std::result::Result<String, FunctionError>;

/// A step function: gets the resolved call, returns its output text
pub type StepFn = Arc<dyn Fn(&FunctionCall) -> FunctionResult + Send + Sync>;

/// Resolved arguments handed to a step function
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
    pub context: StepContext,
}

impl FunctionCall {
    pub fn arg(&self, i: usize) -> std::result::Result<&Value, FunctionError> {
        self.args
            .get(i)
            .ok_or_else(|| FunctionError::Failed(format!("missing positional argument {i}")))
    }

    pub fn arg_str(&self, i: usize) -> std::result::Result<&str, FunctionError> {
        self.arg(i)?
            .as_str()
            .ok_or_else(|| FunctionError::Failed(format!("argument {i} must be a string")))
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Resolve a path against the run directory
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.context.path(rel)
    }
}

/// Subcommand a function host answers to
pub const RUN_FUNCTION_COMMAND: &str = "run-function";

pub const EXIT_PASS: i32 = 0;
pub const EXIT_FAIL: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// One function call, as sent to the host on stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRequest {
    pub function: String,
    #[serde(default)]
    pub args: Vec<JsonValue>,
    #[serde(default)]
    pub kwargs: IndexMap<String, JsonValue>,
    pub run_dir: PathBuf,
    pub step_number: usize,
}

/// The program function calls are sent to
///
/// Any binary can host functions: on its host arguments it should call
/// [`serve_stdio`] with its registry and exit with the returned code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHost {
    program: PathBuf,
    args: Vec<String>,
}

impl FunctionHost {
    /// `program run-function`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_args(program, [RUN_FUNCTION_COMMAND])
    }

    pub fn with_args<S: Into<String>>(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The running executable
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Named step functions available to test configs
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, StepFn>,
    host: Option<FunctionHost>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `write_json`, `write_text` and `assert_truthy`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("write_json", write_json)
            .register("write_text", write_text)
            .register("assert_truthy", assert_truthy);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&FunctionCall) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    /// Send calls to `host` instead of the running executable
    ///
    /// The host must serve a registry with the same names.
    pub fn served_by(mut self, host: FunctionHost) -> Self {
        self.host = Some(host);
        self
    }

    pub fn host(&self) -> Option<&FunctionHost> {
        self.host.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<StepFn> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .field("host", &self.host)
            .finish()
    }
}

fn write_json(call: &FunctionCall) -> FunctionResult {
    let path = call.path(call.arg_str(0)?);
    let value = match call.arg(1)? {
        Value::Json(v) => v.clone(),
        Value::Table(t) => t.to_json(),
        Value::Dataset(d) => d.to_json(),
        Value::Group(g) => {
            return Err(FunctionError::Failed(format!("cannot write group {g} as JSON")))
        }
    };
    json_write(&path, &value)?;
    Ok(format!("Wrote {}", path.display()))
}

fn write_text(call: &FunctionCall) -> FunctionResult {
    let path = call.path(call.arg_str(0)?);
    let text = match call.arg(1)? {
        Value::Json(JsonValue::String(s)) => s.clone(),
        other => other.to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, text)?;
    Ok(format!("Wrote {}", path.display()))
}

fn assert_truthy(call: &FunctionCall) -> FunctionResult {
    let value = call.arg(0)?;
    if value.is_truthy() {
        Ok(format!("{value} is truthy"))
    } else {
        Err(FunctionError::Assertion(format!("{value} is not truthy")))
    }
}

/// Answer one request read from `input`
///
/// The function's output goes to `out`, a failure message to `err`. Returns
/// the exit code for the host process.
pub fn serve(
    registry: &FunctionRegistry,
    input: impl Read,
    out: &mut impl Write,
    err: &mut impl Write,
) -> i32 {
    let (code, written) = match answer(registry, input) {
        Ok(text) => (EXIT_PASS, write!(out, "{text}").and_then(|()| out.flush())),
        Err(FunctionError::Assertion(msg)) => (EXIT_FAIL, write!(err, "{msg}")),
        Err(FunctionError::Failed(msg)) => (EXIT_ERROR, write!(err, "{msg}")),
    };
    match written.and_then(|()| err.flush()) {
        Ok(()) => code,
        Err(_) => EXIT_ERROR,
    }
}

/// [`serve`] over the process's own stdin, stdout and stderr
pub fn serve_stdio(registry: &FunctionRegistry) -> i32 {
    // Panics are reported through stderr and the exit code
    std::panic::set_hook(Box::new(|_| {}));
    serve(
        registry,
        std::io::stdin().lock(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
}

fn answer(registry: &FunctionRegistry, input: impl Read) -> FunctionResult {
    let request: FunctionRequest = serde_json::from_reader(input)
        .map_err(|e| FunctionError::Failed(format!("Invalid function request: {e}")))?;
    let func = registry
        .get(&request.function)
        .ok_or_else(|| Error::UnknownFunction(request.function.clone()))?;

    let parsers = ParserRegistry::default();
    let base = Some(request.run_dir.as_path());
    let args = request
        .args
        .iter()
        .map(|a| resolve(a, base, &parsers))
        .collect::<Result<Vec<_>>>()?;
    let kwargs = request
        .kwargs
        .iter()
        .map(|(k, v)| Ok((k.clone(), resolve(v, base, &parsers)?)))
        .collect::<Result<IndexMap<_, _>>>()?;
    let call = FunctionCall {
        args,
        kwargs,
        context: StepContext::new(request.step_number, &request.run_dir, "RunFunctionStep"),
    };

    match std::panic::catch_unwind(AssertUnwindSafe(|| func(&call))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload);
            if msg.starts_with("assertion") {
                Err(FunctionError::Assertion(msg))
            } else {
                Err(FunctionError::Failed(msg))
            }
        }
    }
}

/// Calls a registered function in a host process
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStep {
    name: String,
    host: Option<FunctionHost>,
    args: Vec<JsonValue>,
    kwargs: IndexMap<String, JsonValue>,
    timeout: Option<Duration>,
}

impl FunctionStep {
    /// Call `name` on the running executable
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            args: Vec::new(),
            kwargs: IndexMap::new(),
            timeout: None,
        }
    }

    /// Look the function up by name, using the registry's host
    pub fn from_registry(registry: &FunctionRegistry, name: &str) -> Result<Self> {
        if !registry.contains(name) {
            return Err(Error::UnknownFunction(name.to_string()));
        }
        let step = Self::new(name);
        Ok(match registry.host() {
            Some(host) => step.with_host(host.clone()),
            None => step,
        })
    }

    pub fn with_host(mut self, host: FunctionHost) -> Self {
        self.host = Some(host);
        self
    }

    pub fn arg(mut self, arg: JsonValue) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = JsonValue>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check that every path reference resolves
    ///
    /// The host resolves the arguments again when it runs the function.
    pub(super) fn pre_process(&self, base: Option<&Path>, registry: &ParserRegistry) -> Result<()> {
        for raw in self.args.iter().chain(self.kwargs.values()) {
            resolve(raw, base, registry)?;
        }
        Ok(())
    }

    pub(super) async fn execute(&self, ctx: &StepContext) -> Result<StepOutput> {
        let host = match &self.host {
            Some(host) => host.clone(),
            None => FunctionHost::current_exe()?,
        };
        let request = serde_json::to_vec(&FunctionRequest {
            function: self.name.clone(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            run_dir: ctx.run_dir.clone(),
            step_number: ctx.step_number,
        })?;

        let mut cmd = Command::new(&host.program);
        cmd.args(&host.args)
            .current_dir(&ctx.run_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            step = ctx.step_number,
            function = %self.name,
            host = %host.program.display(),
            "Calling step function"
        );

        // Dropping this future on timeout drops the child, which kills it
        let call = async move {
            let mut child = cmd.spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(&request).await {
                    tracing::debug!(error = %e, "Function host did not read its request");
                }
            }
            child.wait_with_output().await
        };

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Ok(StepOutput::error(format!(
                        "Function timed out after {} seconds",
                        limit.as_secs_f64()
                    )))
                }
            },
            None => call.await,
        };
        let output = match result {
            Ok(o) => o,
            Err(e) => {
                return Ok(StepOutput::error(format!(
                    "Failed to run function host {}: {e}",
                    host.program.display()
                )))
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(match output.status.code() {
            Some(EXIT_PASS) => StepOutput::pass(text),
            Some(EXIT_FAIL) => StepOutput::fail(text),
            Some(code) => {
                tracing::debug!(step = ctx.step_number, code, "Function host errored");
                StepOutput::error(text)
            }
            None => StepOutput::error(format!(
                "{text}Function '{}' crashed ({})",
                self.name, output.status
            )),
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => s.to_string(),
            Err(_) => "function panicked".to_string(),
        },
    }
}

impl fmt::Display for FunctionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.args.iter().map(JsonValue::to_string));
        parts.extend(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")));
        write!(f, "RunFunctionStep({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{Step, StepStatus};
    use serde_json::json;
    use std::fs;

    fn fib(n: u64) -> u64 {
        if n < 2 {
            n
        } else {
            fib(n - 1) + fib(n - 2)
        }
    }

    fn request(function: &str, run_dir: &Path) -> FunctionRequest {
        FunctionRequest {
            function: function.to_string(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
            run_dir: run_dir.to_path_buf(),
            step_number: 1,
        }
    }

    fn answer_with(registry: &FunctionRegistry, request: &FunctionRequest) -> (i32, String, String) {
        let input = serde_json::to_vec(request).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = serve(registry, input.as_slice(), &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[cfg(unix)]
    fn sh_host(script: &str) -> FunctionHost {
        FunctionHost::with_args("sh", ["-c", script])
    }

    #[test]
    fn test_display_orders_args_then_kwargs() {
        let step = FunctionStep::new("add")
            .arg(json!(1))
            .arg(json!("two"))
            .kwarg("z", json!(3))
            .kwarg("a", json!([4]));
        assert_eq!(step.to_string(), r#"RunFunctionStep(add, 1, "two", z=3, a=[4])"#);
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::with_builtins();
        assert!(matches!(
            FunctionStep::from_registry(&registry, "nope"),
            Err(Error::UnknownFunction(_))
        ));
        assert_eq!(registry.names(), ["assert_truthy", "write_json", "write_text"]);
    }

    #[test]
    fn test_registry_host_is_passed_to_steps() {
        let host = FunctionHost::new("/opt/tools/functions");
        assert_eq!(host.args(), [RUN_FUNCTION_COMMAND]);

        let registry = FunctionRegistry::with_builtins().served_by(host.clone());
        let step = FunctionStep::from_registry(&registry, "write_json").unwrap();
        assert_eq!(step, FunctionStep::new("write_json").with_host(host));
    }

    #[test]
    fn test_serve_recursive_function_with_mixed_args() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = FunctionRegistry::new();
        registry.register("fib", |call| {
            let n = call.arg(0)?.as_json().and_then(JsonValue::as_u64).unwrap_or(0);
            let offset = call
                .kwarg("offset")
                .and_then(Value::as_json)
                .and_then(JsonValue::as_u64)
                .unwrap_or(0);
            Ok((fib(n) + offset).to_string())
        });

        let mut req = request("fib", tmp.path());
        req.args.push(json!(10));
        req.kwargs.insert("offset".into(), json!(1));
        assert_eq!(answer_with(&registry, &req), (EXIT_PASS, "56".to_string(), String::new()));
    }

    #[test]
    fn test_serve_maps_failures_to_exit_codes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = FunctionRegistry::new();
        registry
            .register("check", |_| Err(FunctionError::Assertion("1 != 2".into())))
            .register("assert_panics", |_| {
                assert_eq!(1, 2);
                Ok(String::new())
            })
            .register("boom", |_| panic!("boom"))
            .register("failed", |_| Err(FunctionError::Failed("bad input".into())));

        let (code, out, err) = answer_with(&registry, &request("check", tmp.path()));
        assert_eq!((code, out.as_str(), err.as_str()), (EXIT_FAIL, "", "1 != 2"));

        let (code, _, err) = answer_with(&registry, &request("assert_panics", tmp.path()));
        assert_eq!(code, EXIT_FAIL);
        assert!(err.starts_with("assertion"), "{err}");

        let (code, _, err) = answer_with(&registry, &request("boom", tmp.path()));
        assert_eq!((code, err.as_str()), (EXIT_ERROR, "boom"));

        let (code, _, err) = answer_with(&registry, &request("failed", tmp.path()));
        assert_eq!((code, err.as_str()), (EXIT_ERROR, "bad input"));

        let (code, _, err) = answer_with(&registry, &request("missing", tmp.path()));
        assert_eq!(code, EXIT_ERROR);
        assert!(err.contains("Unknown function 'missing'"), "{err}");
    }

    #[test]
    fn test_serve_rejects_malformed_request() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = serve(&FunctionRegistry::with_builtins(), &b"{not json"[..], &mut out, &mut err);
        assert_eq!(code, EXIT_ERROR);
        assert!(String::from_utf8(err).unwrap().starts_with("Invalid function request"));
    }

    #[test]
    fn test_builtins_write_into_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = FunctionRegistry::with_builtins();

        let mut req = request("write_json", tmp.path());
        req.args = vec![json!("output/coffee.json"), json!({"best_coffee_shop": "Ozo"})];
        assert_eq!(answer_with(&registry, &req).0, EXIT_PASS);
        let written = fs::read_to_string(tmp.path().join("output/coffee.json")).unwrap();
        assert!(written.contains("Ozo"));

        let mut req = request("assert_truthy", tmp.path());
        req.args = vec![json!(["output/coffee.json", ["best_coffee_shop"]])];
        assert_eq!(answer_with(&registry, &req).0, EXIT_PASS);

        req.args = vec![json!([])];
        assert_eq!(answer_with(&registry, &req).0, EXIT_FAIL);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_host_receives_request_in_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let step = FunctionStep::new("echo")
            .arg(json!(7))
            .with_host(sh_host("cat; echo; pwd"));

        let out = Step::new(step).run(4, tmp.path()).await;
        assert_eq!(out.status, StepStatus::Pass);
        let (json, cwd) = out.output.split_once('\n').unwrap();
        let sent: FunctionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(sent.function, "echo");
        assert_eq!(sent.args, [json!(7)]);
        assert_eq!(sent.step_number, 4);
        assert_eq!(sent.run_dir, tmp.path());
        assert_eq!(
            Path::new(cwd.trim()).canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_host_exit_codes() {
        let tmp = tempfile::tempdir().unwrap();
        let cases = [
            ("cat >/dev/null; printf 42", StepStatus::Pass),
            ("cat >/dev/null; echo nope >&2; exit 1", StepStatus::Fail),
            ("cat >/dev/null; exit 2", StepStatus::Error),
            ("cat >/dev/null; exit 101", StepStatus::Error),
        ];
        for (i, (script, status)) in cases.into_iter().enumerate() {
            let step = FunctionStep::new("f").with_host(sh_host(script));
            let out = Step::new(step).run(i + 1, tmp.path()).await;
            assert_eq!(out.status, status, "{script}: {out:?}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crashed_host_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let step = FunctionStep::new("deep").with_host(sh_host("kill -ABRT $$"));
        let out = Step::new(step).run(1, tmp.path()).await;
        assert_eq!(out.status, StepStatus::Error);
        assert!(out.output.contains("Function 'deep' crashed"), "{}", out.output);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_function_is_killed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("output")).unwrap();
        let step = FunctionStep::new("slow")
            .with_host(sh_host("sleep 0.8; echo late > output/late.txt"))
            .with_timeout(Duration::from_millis(100));

        let out = Step::new(step).run(1, tmp.path()).await;
        assert_eq!(out.status, StepStatus::Error);
        assert!(out.output.starts_with("Function timed out after"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!tmp.path().join("output/late.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_host_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let step = FunctionStep::new("f").with_host(FunctionHost::new("/no/such/hyalus-host"));
        let out = Step::new(step).run(1, tmp.path()).await;
        assert_eq!(out.status, StepStatus::Error);
        assert!(out.output.starts_with("Failed to run function host"));
    }

    #[tokio::test]
    async fn test_unresolvable_reference_errors_before_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("output")).unwrap();
        fs::write(tmp.path().join("output/a.json"), "{}").unwrap();
        let step = FunctionStep::new("f")
            .with_host(FunctionHost::new("/no/such/hyalus-host"))
            .arg(json!(["output/a.json", ["missing"]]));
        let out = Step::new(step).run(1, tmp.path()).await;
        assert_eq!(out.status, StepStatus::Error);
        assert!(out.output.contains("missing"), "{}", out.output);
    }
}
