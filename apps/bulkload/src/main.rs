//! bulkload - replace accounts in a remote identity API from a CSV file
//!
//! Every row is looked up by login; an existing account is deactivated and
//! deleted, then a new one is created with the row's bcrypt hash. Rows the
//! API refuses go to `<input>_reject.csv`, rows deferred by rate limiting go
//! to `<input>_replay.csv` for a later run.

use bulkload::config::Config;
use bulkload::error::CliResult;
use bulkload::logging;
use bulkload::pipeline::run_migration;
use clap::Parser;
use std::path::PathBuf;

/// Bulk account loader
#[derive(Parser)]
#[command(name = "bulkload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    config: PathBuf,

    /// CSV file with one account per row
    csv: PathBuf,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, default_value = logging::DEFAULT_FILTER, env = "BULKLOAD_LOG")]
    log_filter: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_filter, cli.json_logs);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = Config::load(&cli.config)?;
    let summary = run_migration(&config, &cli.csv, !cli.no_progress).await?;
    summary.log();
    summary.print();
    Ok(())
}
