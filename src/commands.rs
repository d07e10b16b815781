//! CLI command definitions
//!
//! Defines the clap commands for the hyalus CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tests by name, suite file (.ste) or tag
    #[command(after_help = "\
Step arguments of the form [FILE, SEARCH] read SEARCH from FILE when FILE is an
existing .json, .tsv, .csv or .npz file. Use [FILE, []] for the whole file; a
bare FILE string is compared as a literal.")]
    Run {
        /// Test names or suite files
        tests: Vec<String>,

        /// Also run tests carrying this tag (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Require every given tag instead of any of them
        #[arg(long)]
        all_tags: bool,

        /// Directory receiving run directories (default: from settings)
        #[arg(long)]
        runs_dir: Option<PathBuf>,

        /// Extra directory to search for tests (repeatable)
        #[arg(long = "search-dir", short = 's')]
        search_dirs: Vec<PathBuf>,

        /// Delete the run directory of every passing test
        #[arg(long)]
        cleanup_on_pass: bool,
    },

    /// List available tests
    #[command(alias = "ls")]
    List {
        /// Only list tests carrying this tag (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Require every given tag instead of any of them
        #[arg(long)]
        all_tags: bool,

        /// Extra directory to search for tests (repeatable)
        #[arg(long = "search-dir", short = 's')]
        search_dirs: Vec<PathBuf>,
    },

    /// Remove old test runs
    Clean {
        /// Only remove runs of these tests
        tests: Vec<String>,

        /// Only remove runs carrying this tag (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Require every given tag instead of any of them
        #[arg(long)]
        all_tags: bool,

        /// Only remove runs from this date on (YYYY-MM-DD)
        #[arg(long)]
        oldest: Option<chrono::NaiveDate>,

        /// Only remove runs up to this date (YYYY-MM-DD)
        #[arg(long)]
        newest: Option<chrono::NaiveDate>,

        /// Directory holding run directories (default: from settings)
        #[arg(long)]
        runs_dir: Option<PathBuf>,

        /// Remove without asking
        #[arg(long, short)]
        force: bool,
    },

    /// Create new tests from a template
    New {
        /// Names of the tests to create
        #[arg(required = true)]
        names: Vec<String>,

        /// Directory to create them in (default: current directory)
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },

    /// Answer one step function call read from stdin
    #[command(name = "run-function", hide = true)]
    RunFunction,

    /// Show or change persistent settings
    Config {
        /// Set a setting: NAME=VALUE (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Reset a setting to its default (repeatable)
        #[arg(long = "reset", value_name = "NAME")]
        reset: Vec<String>,
    },
}
