//! sqltrack CLI
//!
//! ```text
//! sqltrack schema.sql --environment staging
//! sqltrack schema.sql --record-history
//! sqltrack schema.sql --clear-history
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use colored::*;
use tracing_subscriber::EnvFilter;

use sqltrack::config::default_config_path;
use sqltrack::{
    Console, FixedAnswer, HistoryStore, Invocation, RunMode, RunOutcome, Runner, SplitterKind,
    TrackError,
};

#[derive(Parser)]
#[command(name = "sqltrack")]
#[command(version)]
#[command(about = "Run only the statements of a SQL script that have not been applied yet")]
struct Cli {
    /// SQL script to run (relative to the current directory or absolute)
    #[arg(value_hint = ValueHint::FilePath)]
    script: PathBuf,

    /// Config file with one [section] per environment [default: ~/.sqltrack/config.ini]
    #[arg(long, env = "SQLTRACK_CONFIG", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Config section to use; also scopes the history
    #[arg(short, long, default_value = "default")]
    environment: String,

    /// Mark new statements as applied without executing them
    #[arg(long)]
    record_history: bool,

    /// Delete the history for this script and environment
    #[arg(long)]
    clear_history: bool,

    /// Statement splitting strategy
    #[arg(long, value_enum, default_value_t = SplitterKind::Delimiter)]
    splitter: SplitterKind,

    /// Execute without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Directory holding history files [default: ~/.sqltrack/history]
    #[arg(long, env = "SQLTRACK_HISTORY_DIR", value_hint = ValueHint::DirPath)]
    history_dir: Option<PathBuf>,

    /// Debug logging on stderr (otherwise RUST_LOG, default warn)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let console = Console::new();
    match run(cli, &console).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<TrackError>() {
                Some(track) => {
                    eprintln!("{} {} failed: {}", "✗".red(), track.phase(), track);
                    if track.rolled_back() {
                        eprintln!("  {}", "Rollback complete. History was not updated.".yellow());
                    }
                }
                None => eprintln!("{} {:#}", "✗".red(), err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, console: &Console) -> Result<RunOutcome> {
    let mode = RunMode::from_flags(cli.record_history, cli.clear_history)?;

    let config = cli
        .config
        .or_else(default_config_path)
        .context("Cannot locate home directory; pass --config")?;
    let history_dir = cli
        .history_dir
        .or_else(HistoryStore::default_dir)
        .context("Cannot locate home directory; pass --history-dir")?;

    let mut runner =
        Runner::new(HistoryStore::new(history_dir), console).with_splitter(cli.splitter.build());
    if cli.yes {
        runner = runner.with_confirm(FixedAnswer(true));
    }

    let invocation = Invocation::new(cli.script, config)
        .environment(cli.environment)
        .mode(mode);

    Ok(runner.run(&invocation).await?)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sqltrack=debug,sqlx=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
