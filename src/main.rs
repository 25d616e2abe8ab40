mod cli;
mod error;
mod upload;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use keepsake_config::Config;
use keepsake_upload::{BatchReport, MediaPath};
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Some files could not be stored; the rest were.
const PARTIAL_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(error = ?error, "Command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Config => {
            let json = serde_json::to_string_pretty(&config.redacted()).or_raise(|| ErrorKind::Output)?;
            writeln!(std::io::stdout(), "{json}").or_raise(|| ErrorKind::Output)?;
            Ok(ExitCode::SUCCESS)
        },
        Command::Upload(args) => {
            let report = upload::run(&config, args).await?;
            print_report(&report)?;
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(PARTIAL_FAILURE)
            })
        },
    }
}

/// One JSON line per stored file on stdout; failures go to the log.
fn print_report(report: &BatchReport<MediaPath>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for media in &report.uploaded {
        let line = serde_json::to_string(media).or_raise(|| ErrorKind::Output)?;
        writeln!(stdout, "{line}").or_raise(|| ErrorKind::Output)?;
    }
    for failure in &report.failed {
        tracing::error!(file = %failure.file.name, error = ?failure.error, "Upload failed");
    }
    tracing::info!(
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        concurrency = report.concurrency,
        "Batch finished"
    );
    Ok(())
}
