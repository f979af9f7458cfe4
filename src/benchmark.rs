//! # Benchmark Engine Module
//!
//! This module turns parsed command-line arguments into a validated
//! [`BenchmarkConfig`] and drives one run through [`BenchmarkRunner`].
//!
//! ## Execution Lifecycle
//!
//! 1. **Validation**: parameters and thresholds are parsed and checked.
//! 2. **Preparation**: kind-specific checks that must pass before any worker
//!    exists (target folder creation, read file size, shuffled read plan).
//! 3. **Measurement**: pool-backed kinds run on the [`WorkerPool`] from a
//!    blocking task; HTTP GET and ping run once on the async runtime.
//! 4. **Aggregation**: worker samples are reduced to one [`AggregateMetric`].
//!
//! Classification and formatting live in [`crate::threshold`] and
//! [`crate::results`]; the runner only measures.

use crate::cli::{
    parse_params, parse_thresholds, Args, BenchmarkKind, OutputFormat, PingProviderKind,
};
use crate::error::{BenchError, Result};
use crate::metrics::{aggregate_cpu, aggregate_elapsed, AggregateMetric, PingResponse};
use crate::ops::{
    CpuOp, DiskReadOp, DiskWriteOp, HttpGetOp, MemOp, PingProvider, PingProviderFactory,
    PingRequest, ReadMode,
};
use crate::pool::{WorkerOperation, WorkerPool, WorkerResult};
use crate::threshold::ThresholdSpec;
use crate::utils::{required_read_bytes, validate_threads};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Kind-specific target of a benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    None,
    /// Folder receiving the disk-write files.
    Folder(PathBuf),
    /// Pre-existing file read by the disk-read kinds.
    File(PathBuf),
    /// Reference file basename and the URL to download.
    Http { reference: String, url: String },
    Host(String),
}

/// Parameters shared by every benchmark kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkParams {
    /// Iterations per worker (echo requests for ping).
    pub times: u64,
    pub size_in_bytes: usize,
    pub threads: usize,
    pub target: Target,
}

impl BenchmarkParams {
    fn path(&self) -> Result<&Path> {
        match &self.target {
            Target::Folder(path) | Target::File(path) => Ok(path),
            other => Err(BenchError::config(format!(
                "Expected a folder or file target, got {:?}",
                other
            ))),
        }
    }
}

/// A helper struct to log the run configuration in one consistent block.
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config;
        let params = &config.params;

        writeln!(f, "Starting benchmark: {}", config.kind)?;
        match config.kind {
            BenchmarkKind::HttpGet => {}
            _ => writeln!(f, "  Times:              {}", params.times)?,
        }
        if params.size_in_bytes > 0 {
            writeln!(f, "  Size:               {} bytes", params.size_in_bytes)?;
        }
        if config.kind.is_pooled() {
            writeln!(f, "  Threads:            {}", params.threads)?;
            let affinity = config
                .affinity
                .map_or("Not set".to_string(), |c| c.to_string());
            writeln!(f, "  Affinity:           {}", affinity)?;
        }
        match &params.target {
            Target::None => {}
            Target::Folder(path) => writeln!(f, "  Folder:             {}", path.display())?,
            Target::File(path) => writeln!(f, "  File:               {}", path.display())?,
            Target::Http { reference, url } => {
                writeln!(f, "  URL:                {}", url)?;
                writeln!(
                    f,
                    "  Reference:          {}",
                    config.refs_folder.join(reference).display()
                )?;
            }
            Target::Host(host) => {
                writeln!(f, "  Host:               {}", host)?;
                writeln!(f, "  Provider:           {:?}", config.ping_provider)?;
            }
        }
        let mode = if config.thresholds.is_some() {
            "Classified"
        } else {
            "Simplified"
        };
        write!(f, "  Report:             {}", mode)
    }
}

/// Validated configuration of one run.
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub kind: BenchmarkKind,
    pub params: BenchmarkParams,

    /// `None` selects the simplified report.
    pub thresholds: Option<ThresholdSpec>,

    pub format: OutputFormat,

    /// Folder holding the HTTP GET reference files.
    pub refs_folder: PathBuf,

    pub ping_provider: PingProviderKind,

    /// First core for worker pinning.
    pub affinity: Option<usize>,

    /// Seed for the random disk read plan.
    pub seed: Option<u64>,

    /// Upper bound on the whole HTTP GET transfer.
    pub http_timeout: Duration,
}

impl BenchmarkConfig {
    /// Create benchmark configuration from CLI arguments
    ///
    /// Every failure here is a [`BenchError::Config`] so the caller can take
    /// the usage path.
    pub fn from_args(args: &Args) -> Result<Self> {
        validate_threads(args.threads)?;

        let threads = if args.kind.is_pooled() {
            args.threads
        } else {
            if args.threads > 1 {
                warn!(
                    "{} runs a single operation, ignoring {} threads",
                    args.kind, args.threads
                );
            }
            1
        };

        let params = parse_params(args.kind, &args.params, threads)?;
        if matches!(
            args.kind,
            BenchmarkKind::DiskReadSeq | BenchmarkKind::DiskReadRandom
        ) {
            required_read_bytes(params.times, params.threads, params.size_in_bytes)?;
        }
        let thresholds = parse_thresholds(
            args.kind,
            args.warning.as_deref(),
            args.critical.as_deref(),
        )?;

        Ok(Self {
            kind: args.kind,
            params,
            thresholds,
            format: args.format,
            refs_folder: args.refs_folder.clone(),
            ping_provider: args.ping_provider,
            affinity: args.affinity,
            seed: args.seed,
            http_timeout: crate::defaults::HTTP_TIMEOUT,
        })
    }

    pub fn is_classified(&self) -> bool {
        self.thresholds.is_some()
    }
}

/// Everything measured by one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkOutcome {
    pub kind: BenchmarkKind,
    /// Per-worker samples; empty for HTTP GET and ping.
    pub workers: Vec<WorkerResult>,
    pub metric: AggregateMetric,
}

/// Runs one configured benchmark.
///
/// ```rust,no_run
/// # use sbench::benchmark::{BenchmarkConfig, BenchmarkRunner};
/// # use sbench::cli::{Args, BenchmarkKind};
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let args = Args {
///     kind: BenchmarkKind::Cpu,
///     params: "1000000".to_string(),
///     threads: 2,
///     ..Default::default()
/// };
/// let runner = BenchmarkRunner::new(BenchmarkConfig::from_args(&args)?);
/// let outcome = runner.run().await?;
/// println!("{:?}", outcome.metric);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    ping_provider: Box<dyn PingProvider>,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        let ping_provider = PingProviderFactory::create(&config.ping_provider);
        Self {
            config,
            ping_provider,
        }
    }

    /// Replace the ping provider selected by the configuration.
    pub fn with_ping_provider(mut self, provider: Box<dyn PingProvider>) -> Self {
        self.ping_provider = provider;
        self
    }

    /// Run the benchmark and aggregate its samples.
    ///
    /// Preparation failures (missing or short read file, unusable folder)
    /// surface before any worker is spawned. A failing worker fails the
    /// whole run.
    pub async fn run(&self) -> Result<BenchmarkOutcome> {
        info!(
            "{}",
            BenchmarkConfigDisplay {
                config: &self.config
            }
        );

        let params = &self.config.params;
        let kind = self.config.kind;
        let (workers, metric) = match kind {
            BenchmarkKind::Cpu => {
                let workers = self.run_pool(CpuOp::new(params.times)).await?;
                let metric = aggregate_cpu(&workers, params.times)?;
                (workers, metric)
            }
            BenchmarkKind::Mem => {
                let op = MemOp::new(params.times, params.size_in_bytes);
                let workers = self.run_pool(op).await?;
                let metric = aggregate_elapsed(&workers)?;
                (workers, metric)
            }
            BenchmarkKind::DiskWrite => {
                let op =
                    DiskWriteOp::prepare(params.path()?, params.times, params.size_in_bytes)?;
                let workers = self.run_pool(op).await?;
                let metric = aggregate_elapsed(&workers)?;
                (workers, metric)
            }
            BenchmarkKind::DiskReadSeq | BenchmarkKind::DiskReadRandom => {
                let mode = if kind == BenchmarkKind::DiskReadSeq {
                    ReadMode::Sequential
                } else {
                    ReadMode::Random
                };
                let op = DiskReadOp::prepare(
                    params.path()?,
                    mode,
                    params.times,
                    params.size_in_bytes,
                    params.threads,
                    self.config.seed,
                )?;
                let workers = self.run_pool(op).await?;
                let metric = aggregate_elapsed(&workers)?;
                (workers, metric)
            }
            BenchmarkKind::HttpGet => (Vec::new(), self.run_http_get().await?),
            BenchmarkKind::Ping => (Vec::new(), self.run_ping().await?),
        };

        debug!("Aggregate metric: {:?}", metric);
        Ok(BenchmarkOutcome {
            kind,
            workers,
            metric,
        })
    }

    async fn run_pool<O>(&self, op: O) -> Result<Vec<WorkerResult>>
    where
        O: WorkerOperation + Send + 'static,
    {
        let pool =
            WorkerPool::new(self.config.params.threads).with_affinity(self.config.affinity);
        tokio::task::spawn_blocking(move || pool.run(&op))
            .await
            .map_err(|e| BenchError::Runtime(format!("worker pool task failed: {}", e)))?
    }

    async fn run_http_get(&self) -> Result<AggregateMetric> {
        let Target::Http { reference, url } = &self.config.params.target else {
            return Err(BenchError::config("HTTP GET needs a reference name and a URL"));
        };
        let op = HttpGetOp::new(
            url.clone(),
            self.config.refs_folder.join(reference),
            self.config.http_timeout,
        );
        let outcome = op.run().await?;
        Ok(AggregateMetric::HttpGet {
            seconds: outcome.seconds,
            differs: outcome.differs,
        })
    }

    async fn run_ping(&self) -> Result<AggregateMetric> {
        let Target::Host(host) = &self.config.params.target else {
            return Err(BenchError::config("Ping needs a destination host"));
        };
        let request = PingRequest {
            times: self.config.params.times,
            size_in_bytes: self.config.params.size_in_bytes,
            host: host.clone(),
        };
        debug!("Pinging with the {} provider", self.ping_provider.name());
        let response = self.ping_provider.ping(&request).await?;
        ping_metric(response, &request, self.config.is_classified())
    }
}

/// Zero replies leaves nothing to average: fatal unless a classifier can
/// report the loss instead.
fn ping_metric(
    response: PingResponse,
    request: &PingRequest,
    classified: bool,
) -> Result<AggregateMetric> {
    if response.is_total_loss() && !classified {
        return Err(BenchError::NoReplies {
            times: request.times,
            host: request.host.clone(),
        });
    }
    Ok(AggregateMetric::Ping(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Thresholds;

    fn args(kind: BenchmarkKind, params: &str) -> Args {
        Args {
            kind,
            params: params.to_string(),
            ..Default::default()
        }
    }

    fn request() -> PingRequest {
        PingRequest {
            times: 4,
            size_in_bytes: 56,
            host: "192.0.2.1".to_string(),
        }
    }

    #[test]
    fn test_benchmark_config_creation() {
        let mut a = args(BenchmarkKind::Mem, "10,1048576");
        a.threads = 4;
        a.warning = Some("0.5".to_string());
        a.critical = Some("1".to_string());

        let config = BenchmarkConfig::from_args(&a).unwrap();
        assert_eq!(config.params.times, 10);
        assert_eq!(config.params.size_in_bytes, 1_048_576);
        assert_eq!(config.params.threads, 4);
        assert_eq!(
            config.thresholds,
            Some(ThresholdSpec::Scalar(Thresholds {
                warn: 0.5,
                crit: 1.0
            }))
        );
        assert!(config.is_classified());
    }

    #[test]
    fn test_single_operation_kinds_ignore_threads() {
        let mut a = args(BenchmarkKind::Ping, "4,56,localhost");
        a.threads = 8;
        let config = BenchmarkConfig::from_args(&a).unwrap();
        assert_eq!(config.params.threads, 1);
    }

    #[test]
    fn test_config_errors() {
        let mut a = args(BenchmarkKind::Cpu, "100");
        a.threads = 0;
        assert!(BenchmarkConfig::from_args(&a).unwrap_err().is_config());

        let mut a = args(BenchmarkKind::Cpu, "100");
        a.warning = Some("1".to_string());
        assert!(BenchmarkConfig::from_args(&a).unwrap_err().is_config());

        let a = args(BenchmarkKind::Mem, "100");
        assert!(BenchmarkConfig::from_args(&a).unwrap_err().is_config());
    }

    #[test]
    fn test_read_size_overflow_is_a_config_error() {
        let mut a = args(BenchmarkKind::DiskReadRandom, "18446744073709551615,2,/absent");
        a.threads = 2;
        let err = BenchmarkConfig::from_args(&a).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("overflows"));

        // Writes don't multiply by the thread count.
        let mut a = args(BenchmarkKind::DiskWrite, "18446744073709551615,2,/absent");
        a.threads = 2;
        assert!(BenchmarkConfig::from_args(&a).is_ok());
    }

    #[test]
    fn test_ping_metric_zero_replies() {
        let dead = PingResponse::from_counts(4, 0, 0.0);
        let err = ping_metric(dead, &request(), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Zero responses received when sending 4 echo requests to 192.0.2.1"
        );

        let metric = ping_metric(dead, &request(), true).unwrap();
        assert_eq!(metric, AggregateMetric::Ping(dead));
    }

    #[tokio::test]
    async fn test_runner_cpu() {
        let mut a = args(BenchmarkKind::Cpu, "50000");
        a.threads = 2;
        let runner = BenchmarkRunner::new(BenchmarkConfig::from_args(&a).unwrap());
        let outcome = runner.run().await.unwrap();

        assert_eq!(outcome.workers.len(), 2);
        match outcome.metric {
            AggregateMetric::Cpu {
                seconds,
                calcs_per_second,
            } => {
                assert!(seconds > 0.0);
                assert!(calcs_per_second > 0.0);
            }
            other => panic!("unexpected metric {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runner_mem() {
        let config = BenchmarkConfig::from_args(&args(BenchmarkKind::Mem, "3,4096")).unwrap();
        let runner = BenchmarkRunner::new(config);
        let outcome = runner.run().await.unwrap();
        assert_eq!(outcome.workers.len(), 1);
        assert!(matches!(outcome.metric, AggregateMetric::Elapsed { .. }));
    }
}
