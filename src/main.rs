//! hyalus - file-driven test automation
//!
//! Runs declarative tests in isolated run directories and manages the runs
//! they leave behind.

use clap::Parser;
use commands::Commands;
use hyalus::common::logging::{LogOptions, LoggingContext};
use hyalus::common::settings::SettingsStore;
use hyalus::steps::{function, FunctionRegistry};
use hyalus::{cli, commands};

#[derive(Parser)]
#[command(name = "hyalus", about = "File-driven test automation")]
#[command(version, long_about = None)]
struct Cli {
    /// Log at DEBUG level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Function hosts answer on stdout, so they skip settings and logging
    if let Commands::RunFunction = cli.command {
        std::process::exit(function::serve_stdio(&FunctionRegistry::with_builtins()));
    }

    let mut store = match SettingsStore::load_default() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let logging = LoggingContext::new();
    let settings = store.settings();
    let guard = logging.init(&LogOptions {
        stdout: settings.stdout,
        debug: cli.debug || settings.debug,
    });

    let code = match cli::dispatch(cli.command, &mut store, &logging).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    // Exiting skips destructors, so flush buffered log lines first
    drop(guard);
    std::process::exit(code);
}
