//! # sbench - Main Entry Point
//!
//! Runs one benchmark and reports it the way a monitoring system expects:
//!
//! 1. **Parse arguments**: usage errors exit UNKNOWN (3), `--help` and
//!    `--version` exit 0.
//! 2. **Initialize logging**: diagnostics go to stderr, never stdout.
//! 3. **Validate configuration**: bad parameters take the usage path too.
//! 4. **Run the benchmark**: any fatal failure prints `Error: ...` and
//!    exits CRITICAL (2) without a report.
//! 5. **Report**: one line (or a JSON record) on stdout and the exit code
//!    of the verdict.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use sbench::{
    benchmark::{BenchmarkConfig, BenchmarkOutcome, BenchmarkRunner},
    cli::{Args, OutputFormat},
    error::BenchError,
    logging,
    results::{Report, RunRecord},
};
use std::process::ExitCode;
use tracing::debug;

/// Exit code for invalid command lines.
const EXIT_USAGE: u8 = 3;

/// Exit code for runs that failed before producing a result.
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Held until exit so the file writer flushes.
    let _log_guard = match logging::init(args.verbose, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => return fatal(e),
    };
    debug!("sbench {} starting with {:?}", sbench::VERSION, args);

    let config = match BenchmarkConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => return usage(e),
    };

    let outcome = match BenchmarkRunner::new(config.clone()).run().await {
        Ok(outcome) => outcome,
        Err(e) if e.is_config() => return usage(e),
        Err(e) => return fatal(e.into()),
    };

    match emit(&config, &outcome) {
        Ok(code) => ExitCode::from(code),
        Err(e) => fatal(e),
    }
}

/// Print the report and return its exit code.
fn emit(config: &BenchmarkConfig, outcome: &BenchmarkOutcome) -> Result<u8> {
    let report = Report::build(config.kind, &outcome.metric, config.thresholds.as_ref())?;
    match config.format {
        OutputFormat::Text => println!("{}", report.line),
        OutputFormat::Json => {
            let record = RunRecord::new(config, outcome, &report);
            let json = record
                .to_json()
                .context("Failed to serialize the run record")?;
            println!("{}", json);
        }
    }
    Ok(report.exit_code)
}

fn usage(e: BenchError) -> ExitCode {
    eprintln!("{}", e);
    eprintln!("Try 'sbench --help' for more information.");
    ExitCode::from(EXIT_USAGE)
}

/// One `Error:` line carrying the whole cause chain.
fn fatal(e: anyhow::Error) -> ExitCode {
    eprintln!("Error: {:#}", e);
    ExitCode::from(EXIT_FATAL)
}
