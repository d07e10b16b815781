//! CLI command handling
//!
//! Dispatches CLI commands to the runners, merging command-line flags with
//! the persistent settings.

use std::path::{Path, PathBuf};

use crate::commands::Commands;
use crate::common::logging::LoggingContext;
use crate::common::settings::{Settings, SettingsStore};
use crate::common::{Error, Result};
use crate::steps::{function, FunctionRegistry};
use crate::testing::{
    CleanRunner, ListRunner, RunFilter, SuiteRunner, TagOp, TemplateRunner,
};

/// Dispatch a CLI command
///
/// Returns false when the command ran but reported failure, such as a
/// failing test.
pub async fn dispatch(
    command: Commands,
    store: &mut SettingsStore,
    logging: &LoggingContext,
) -> Result<bool> {
    match command {
        Commands::Run {
            tests,
            tags,
            all_tags,
            runs_dir,
            search_dirs,
            cleanup_on_pass,
        } => {
            let settings = store.settings();
            let runs_dir = runs_dir.unwrap_or_else(|| settings.runs_dir.clone());
            let suite = SuiteRunner::new(runs_dir, merged_search_dirs(search_dirs, settings))
                .tests(tests)
                .tags(tags, tag_op(all_tags, settings))
                .cleanup_on_pass(cleanup_on_pass)
                .logging(logging.clone());
            suite.run().await
        }

        Commands::List {
            tags,
            all_tags,
            search_dirs,
        } => {
            let settings = store.settings();
            let names = ListRunner::new(merged_search_dirs(search_dirs, settings))
                .tags(tags, tag_op(all_tags, settings))
                .run(&mut std::io::stdout().lock())?;
            if names.is_empty() {
                println!("No tests found");
            }
            Ok(true)
        }

        Commands::Clean {
            tests,
            tags,
            all_tags,
            oldest,
            newest,
            runs_dir,
            force,
        } => {
            let settings = store.settings();
            let filter = RunFilter {
                test_names: tests,
                tags,
                tag_op: tag_op(all_tags, settings),
                oldest,
                newest,
            };
            let runs_dir = runs_dir.unwrap_or_else(|| settings.runs_dir.clone());
            CleanRunner::new(runs_dir, filter)
                .force(force || settings.force_clean)
                .run(std::io::stdin().lock(), &mut std::io::stdout().lock())?;
            Ok(true)
        }

        Commands::New { names, dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            TemplateRunner::new(dir)
                .author(store.settings().config_author.clone())
                .run(&names)?;
            Ok(true)
        }

        Commands::Config { set, reset } => {
            apply_settings(store, &set, &reset)?;
            if !set.is_empty() || !reset.is_empty() {
                store.save()?;
                println!("Settings saved to {}", store.path().display());
            }
            println!("{}", store.describe());
            Ok(true)
        }

        Commands::RunFunction => {
            let code = function::serve_stdio(&FunctionRegistry::with_builtins());
            Ok(code == function::EXIT_PASS)
        }
    }
}

/// Apply `NAME=VALUE` updates and resets to the store
fn apply_settings(store: &mut SettingsStore, set: &[String], reset: &[String]) -> Result<()> {
    let mut updates = Vec::with_capacity(set.len());
    for entry in set {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::invalid_setting(entry, "expected NAME=VALUE"))?;
        updates.push((name.trim(), value));
    }

    if let Some((name, _)) = updates.iter().find(|(n, _)| reset.iter().any(|r| r == n)) {
        return Err(Error::invalid_setting(name, "cannot both set and reset a setting"));
    }

    for (name, value) in updates {
        store.update(name, value)?;
    }
    for name in reset {
        store.reset(name)?;
    }
    Ok(())
}

fn tag_op(all_tags: bool, settings: &Settings) -> TagOp {
    if all_tags {
        TagOp::All
    } else {
        settings.tag_operator
    }
}

/// Command-line search dirs first, then the configured ones
fn merged_search_dirs(mut dirs: Vec<PathBuf>, settings: &Settings) -> Vec<PathBuf> {
    for dir in &settings.search_dirs {
        if !dirs.iter().any(|d| same_dir(d, dir)) {
            dirs.push(dir.clone());
        }
    }
    dirs
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
