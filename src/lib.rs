//! # Simple Benchmarks Library
//!
//! Multi-threaded microbenchmarks of CPU, memory, disk, HTTP and ICMP
//! operations, with results classified against warning/critical thresholds
//! in the monitoring plugin style (OK, WARNING, CRITICAL, UNKNOWN).
//!
//! ## Architecture Overview
//!
//! - `cli`: command-line parsing and the `-p` parameter grammar
//! - `benchmark`: configuration validation and the run lifecycle
//! - `pool`: runs N workers of one operation and collects their timings
//! - `ops`: the timed operations (cpu, mem, disk write/read, HTTP GET, ping)
//! - `metrics`: aggregation of worker samples
//! - `threshold`: verdict classification
//! - `results`: report line, exit code and JSON run record
//! - `error`, `logging`, `utils`: shared plumbing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sbench::{Args, BenchmarkConfig, BenchmarkKind, BenchmarkRunner, Report};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args {
//!         kind: BenchmarkKind::Mem,
//!         params: "10,10485760".to_string(),
//!         threads: 4,
//!         warning: Some("0.01".to_string()),
//!         critical: Some("0.05".to_string()),
//!         ..Default::default()
//!     };
//!     let config = BenchmarkConfig::from_args(&args)?;
//!     let outcome = BenchmarkRunner::new(config.clone()).run().await?;
//!     let report = Report::build(config.kind, &outcome.metric, config.thresholds.as_ref())?;
//!
//!     println!("{}", report.line);
//!     Ok(())
//! }
//! ```

/// Benchmark configuration and execution
pub mod benchmark;

/// Command-line interface and parameter parsing
pub mod cli;

pub mod error;

pub mod logging;

/// Aggregation of worker samples into the classified metric
pub mod metrics;

/// Timed operation providers
pub mod ops;

/// Worker pool running one operation on N threads
pub mod pool;

/// Report formatting and the JSON run record
pub mod results;

/// Threshold classification into monitoring verdicts
pub mod threshold;

pub mod utils;

pub use benchmark::{BenchmarkConfig, BenchmarkOutcome, BenchmarkParams, BenchmarkRunner};
pub use cli::{Args, BenchmarkKind};
pub use error::{BenchError, Result};
pub use metrics::{AggregateMetric, PingResponse};
pub use pool::{WorkerOperation, WorkerPool, WorkerResult};
pub use results::{Report, RunRecord};
pub use threshold::{ThresholdSpec, Verdict};

/// The current version of sbench, reported in JSON run records.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default number of workers
    pub const THREADS: usize = 1;

    /// Folder holding the reference files compared by HTTP GET
    pub const HTTP_REFS_FOLDER: &str = "/var/lib/sbench/http_refs";

    /// Upper bound on one HTTP GET transfer
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
}
