//! Logging and tracing configuration
//!
//! A [`LoggingContext`] owns the set of log files that currently receive
//! events. The test runner attaches the run log for the whole run and each
//! step log while that step executes. The global subscriber installed by
//! [`LoggingContext::init`] writes every event to all attached files.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::Result;

/// Options for installing the global subscriber
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Also log to stdout
    pub stdout: bool,
    /// Lower the default level to DEBUG
    pub debug: bool,
}

type Sinks = Arc<Mutex<IndexMap<PathBuf, File>>>;

/// Handle to the attached log files
///
/// Cloning is cheap; clones share the same set of files.
#[derive(Debug, Clone, Default)]
pub struct LoggingContext {
    sinks: Sinks,
}

impl LoggingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global subscriber
    ///
    /// Logs are controlled by the `RUST_LOG` environment variable.
    /// Default level is INFO for this crate (DEBUG with `debug`), WARN for
    /// dependencies. Returns the stdout writer guard when stdout logging is
    /// on; keep it alive until exit so buffered lines are flushed. Installing
    /// twice leaves the first subscriber in place.
    pub fn init(&self, options: &LogOptions) -> Option<WorkerGuard> {
        let default = if options.debug {
            "hyalus=debug,warn"
        } else {
            "hyalus=info,warn"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let file_layer = fmt::layer()
            .with_writer(FileFanout {
                sinks: self.sinks.clone(),
            })
            .with_ansi(false)
            .with_target(false);

        let (stdout_layer, guard) = if options.stdout {
            let (writer, guard) = tracing_appender::non_blocking(io::stdout());
            let layer = fmt::layer().with_writer(writer).with_target(false).compact();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stdout_layer)
            .try_init()
            .is_ok();
        if !installed {
            tracing::debug!("Global subscriber already installed");
        }
        guard
    }

    /// Start writing events to `path`
    ///
    /// The file and its parent directories are created if needed. Returns
    /// false without touching anything when the path is already attached.
    pub fn attach(&self, path: &Path) -> Result<bool> {
        let mut sinks = self.lock();
        if sinks.contains_key(path) {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        sinks.insert(path.to_path_buf(), file);
        Ok(true)
    }

    /// Stop writing events to `path`, returning whether it was attached
    pub fn detach(&self, path: &Path) -> bool {
        self.lock().shift_remove(path).is_some()
    }

    pub fn is_attached(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Attached files in attach order
    pub fn attached(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<PathBuf, File>> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `MakeWriter` that copies each formatted event into every attached file
#[derive(Clone)]
struct FileFanout {
    sinks: Sinks,
}

impl<'a> MakeWriter<'a> for FileFanout {
    type Writer = FanoutWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FanoutWriter {
            sinks: self.sinks.clone(),
        }
    }
}

struct FanoutWriter {
    sinks: Sinks,
}

impl Write for FanoutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        for file in sinks.values_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        for file in sinks.values_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
