//! `ds-pilot` binary: one reconciliation pass per invocation
//!
//! Meant to be triggered externally (cron, systemd timer). Exit codes:
//! `0` run completed, `1` run aborted before mutation, `2` setup failed.

use clap::{Parser, ValueEnum};
use ds_pilot::{Config, Reconciler, SqliteConfigStore};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ds-pilot", version, about = "Reconcile download tasks against advisory decisions")]
struct Cli {
    /// SQLite database holding the `config(key, value)` table
    #[arg(long, env = "DS_PILOT_CONFIG_DB", default_value = "account_book.db")]
    config_db: PathBuf,

    /// Evaluate every decision but issue no control calls
    #[arg(long)]
    dry_run: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(cli: &Cli) -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match cli.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| format!("failed to install tracing subscriber: {e}"))
}

async fn setup(cli: &Cli) -> ds_pilot::Result<Reconciler> {
    let store = SqliteConfigStore::load(&cli.config_db).await?;
    let mut config = Config::from_store(&store)?;
    if cli.dry_run {
        config.run.dry_run = true;
    }
    Reconciler::from_config(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    let reconciler = match setup(&cli).await {
        Ok(reconciler) => reconciler,
        Err(e) => {
            tracing::error!(error = %e, config_db = %cli.config_db.display(), "setup failed");
            return ExitCode::from(2);
        }
    };

    match reconciler.run().await {
        Ok(report) => {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!(error = %e, "failed to render run report"),
            }
            ExitCode::SUCCESS
        }
        Err(aborted) => {
            tracing::error!(trace = ?aborted.trace, "run aborted: {}", aborted.cause);
            ExitCode::from(1)
        }
    }
}
