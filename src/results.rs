//! # Result reporting
//!
//! Formats a run as one stdout line and picks the process exit code.
//!
//! Without thresholds the line is plain (`0.123456 s`, `OK: 0.5 s`,
//! `12.3 ms, 0.00 % loss`). With thresholds it follows the monitoring
//! plugin convention:
//!
//! ```text
//! <Label> <Verdict> = <value> <unit>| <key>=<value>
//! ```
//!
//! and the exit code is the verdict's ordinal. The same data can be
//! emitted as a JSON [`RunRecord`].

use crate::benchmark::{BenchmarkConfig, BenchmarkOutcome, BenchmarkParams};
use crate::cli::BenchmarkKind;
use crate::error::Result;
use crate::metrics::{AggregateMetric, PingResponse};
use crate::threshold::{classify_metric, ThresholdSpec, Verdict};
use serde::{Deserialize, Serialize};

/// Exit code of a finished run that was not classified.
const EXIT_OK: u8 = 0;
/// Exit code of a simplified HTTP GET whose content differs.
const EXIT_KO: u8 = 2;

/// The line to print and the status to exit with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub line: String,
    /// Only set in classified mode, or when the result is unreadable.
    pub verdict: Option<Verdict>,
    pub exit_code: u8,
}

impl Report {
    /// Build the report of `metric`, classifying it when thresholds are set.
    pub fn build(
        kind: BenchmarkKind,
        metric: &AggregateMetric,
        thresholds: Option<&ThresholdSpec>,
    ) -> Result<Self> {
        match thresholds {
            Some(spec) => {
                let verdict = classify_metric(metric, spec)?;
                Ok(Self::classified(kind, metric, verdict))
            }
            None => Ok(Self::simplified(kind, metric)),
        }
    }

    fn classified(kind: BenchmarkKind, metric: &AggregateMetric, verdict: Verdict) -> Self {
        let line = match metric {
            AggregateMetric::Ping(response) => ping_line(verdict, response),
            _ => {
                let (value, unit) = classified_value(metric);
                format!(
                    "{} {} = {:.6} {}| {}={:.6}",
                    kind.label(),
                    verdict,
                    value,
                    unit,
                    kind.perfdata_key(),
                    value
                )
            }
        };
        Self {
            line,
            verdict: Some(verdict),
            exit_code: verdict.exit_code(),
        }
    }

    fn simplified(kind: BenchmarkKind, metric: &AggregateMetric) -> Self {
        let plain = |line: String, exit_code: u8| Self {
            line,
            verdict: None,
            exit_code,
        };

        match metric {
            AggregateMetric::Elapsed { seconds } | AggregateMetric::Cpu { seconds, .. } => {
                plain(format!("{:.6} s", seconds), EXIT_OK)
            }
            AggregateMetric::HttpGet { seconds, differs } => {
                if *differs {
                    plain(format!("KO: {:.6} s", seconds), EXIT_KO)
                } else {
                    plain(format!("OK: {:.6} s", seconds), EXIT_OK)
                }
            }
            AggregateMetric::Ping(response) => match (response.latency_ms, response.loss_percent) {
                (Some(latency), Some(loss)) => {
                    plain(format!("{:.6} ms, {:.2} % loss", latency, loss), EXIT_OK)
                }
                // A reply count without a latency, or no summary at all.
                _ => Self::classified(kind, metric, Verdict::Unknown),
            },
        }
    }
}

/// Value and unit classified for a scalar metric.
fn classified_value(metric: &AggregateMetric) -> (f64, &'static str) {
    match metric {
        AggregateMetric::Cpu {
            calcs_per_second, ..
        } => (*calcs_per_second, "calcs/s"),
        AggregateMetric::Elapsed { seconds } | AggregateMetric::HttpGet { seconds, .. } => {
            (*seconds, "s")
        }
        AggregateMetric::Ping(response) => (response.latency_ms.unwrap_or_default(), "ms"),
    }
}

fn ping_line(verdict: Verdict, response: &PingResponse) -> String {
    let latency = response
        .latency_ms
        .map_or_else(|| "U".to_string(), |l| format!("{:.6}", l));
    let loss = response
        .loss_percent
        .map_or_else(|| "U".to_string(), |l| format!("{:.2}", l));
    format!(
        "Ping {} = {} ms, {} % loss| latency={} loss={}",
        verdict, latency, loss, latency, loss
    )
}

/// JSON record of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub kind: BenchmarkKind,
    pub params: BenchmarkParams,
    pub workers: Vec<crate::pool::WorkerResult>,
    pub metric: AggregateMetric,
    pub verdict: Option<Verdict>,
    pub exit_code: u8,
    pub line: String,
    pub system: SystemInfo,
}

impl RunRecord {
    pub fn new(config: &BenchmarkConfig, outcome: &BenchmarkOutcome, report: &Report) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            kind: outcome.kind,
            params: config.params.clone(),
            workers: outcome.workers.clone(),
            metric: outcome.metric,
            verdict: report.verdict,
            exit_code: report.exit_code,
            line: report.line.clone(),
            system: SystemInfo::default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::Target;
    use crate::threshold::{PingLimits, Thresholds};

    fn scalar(warn: f64, crit: f64) -> ThresholdSpec {
        ThresholdSpec::Scalar(Thresholds { warn, crit })
    }

    fn ping_spec() -> ThresholdSpec {
        ThresholdSpec::Ping(Thresholds {
            warn: PingLimits {
                latency_ms: 100.0,
                loss_percent: 20.0,
            },
            crit: PingLimits {
                latency_ms: 200.0,
                loss_percent: 50.0,
            },
        })
    }

    #[test]
    fn test_simplified_elapsed_and_cpu() {
        let report = Report::build(
            BenchmarkKind::DiskWrite,
            &AggregateMetric::Elapsed { seconds: 1.5 },
            None,
        )
        .unwrap();
        assert_eq!(report.line, "1.500000 s");
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.verdict, None);

        let cpu = AggregateMetric::Cpu {
            seconds: 0.25,
            calcs_per_second: 4e6,
        };
        let report = Report::build(BenchmarkKind::Cpu, &cpu, None).unwrap();
        assert_eq!(report.line, "0.250000 s");
    }

    #[test]
    fn test_classified_mem_ok() {
        let metric = AggregateMetric::Elapsed { seconds: 0.002 };
        let thresholds = scalar(0.01, 0.05);
        let report = Report::build(BenchmarkKind::Mem, &metric, Some(&thresholds)).unwrap();
        assert_eq!(report.line, "Mem OK = 0.002000 s| mem=0.002000");
        assert_eq!(report.verdict, Some(Verdict::Ok));
        assert_eq!(report.exit_code, 0);
    }

    #[test]
    fn test_classified_cpu_reports_throughput() {
        let metric = AggregateMetric::Cpu {
            seconds: 0.5,
            calcs_per_second: 2000.0,
        };
        let thresholds = scalar(1000.0, 5000.0);
        let report = Report::build(BenchmarkKind::Cpu, &metric, Some(&thresholds)).unwrap();
        assert_eq!(
            report.line,
            "Cpu WARNING = 2000.000000 calcs/s| cpu=2000.000000"
        );
        assert_eq!(report.exit_code, 1);
    }

    #[test]
    fn test_http_get_reports() {
        let differs = AggregateMetric::HttpGet {
            seconds: 0.1,
            differs: true,
        };
        let report = Report::build(BenchmarkKind::HttpGet, &differs, None).unwrap();
        assert!(report.line.starts_with("KO"));
        assert_eq!(report.exit_code, 2);

        let report =
            Report::build(BenchmarkKind::HttpGet, &differs, Some(&scalar(10.0, 20.0))).unwrap();
        assert_eq!(report.line, "HttpGet CRITICAL = 0.100000 s| http_get=0.100000");
        assert_eq!(report.exit_code, 2);

        let same = AggregateMetric::HttpGet {
            seconds: 0.1,
            differs: false,
        };
        let report = Report::build(BenchmarkKind::HttpGet, &same, None).unwrap();
        assert_eq!(report.line, "OK: 0.100000 s");
        assert_eq!(report.exit_code, 0);
    }

    #[test]
    fn test_ping_reports() {
        let metric = AggregateMetric::Ping(PingResponse::new(12.345, 0.0));
        let report = Report::build(BenchmarkKind::Ping, &metric, None).unwrap();
        assert_eq!(report.line, "12.345000 ms, 0.00 % loss");

        let report = Report::build(BenchmarkKind::Ping, &metric, Some(&ping_spec())).unwrap();
        assert_eq!(
            report.line,
            "Ping OK = 12.345000 ms, 0.00 % loss| latency=12.345000 loss=0.00"
        );

        let dead = AggregateMetric::Ping(PingResponse::from_counts(4, 0, 0.0));
        let report = Report::build(BenchmarkKind::Ping, &dead, Some(&ping_spec())).unwrap();
        assert_eq!(
            report.line,
            "Ping CRITICAL = U ms, 100.00 % loss| latency=U loss=100.00"
        );
        assert_eq!(report.exit_code, 2);
    }

    #[test]
    fn test_inconsistent_ping_is_unknown_in_both_modes() {
        let metric = AggregateMetric::Ping(PingResponse {
            latency_ms: None,
            loss_percent: Some(50.0),
        });
        for spec in [None, Some(ping_spec())] {
            let report = Report::build(BenchmarkKind::Ping, &metric, spec.as_ref()).unwrap();
            assert_eq!(report.verdict, Some(Verdict::Unknown));
            assert_eq!(report.exit_code, 3);
            assert!(report.line.starts_with("Ping UNKNOWN = U ms"));
        }
    }

    #[test]
    fn test_run_record_json() {
        let config = BenchmarkConfig {
            kind: BenchmarkKind::Mem,
            params: BenchmarkParams {
                times: 10,
                size_in_bytes: 1024,
                threads: 2,
                target: Target::None,
            },
            thresholds: None,
            format: crate::cli::OutputFormat::Json,
            refs_folder: Default::default(),
            ping_provider: Default::default(),
            affinity: None,
            seed: None,
            http_timeout: crate::defaults::HTTP_TIMEOUT,
        };
        let outcome = BenchmarkOutcome {
            kind: BenchmarkKind::Mem,
            workers: vec![],
            metric: AggregateMetric::Elapsed { seconds: 0.5 },
        };
        let report = Report::build(outcome.kind, &outcome.metric, None).unwrap();
        let json = RunRecord::new(&config, &outcome, &report).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["kind"], "mem");
        assert_eq!(value["params"]["times"], 10);
        assert_eq!(value["metric"]["type"], "elapsed");
        assert_eq!(value["line"], "0.500000 s");
        assert_eq!(value["exit_code"], 0);
        assert!(value["system"]["cpu_cores"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_system_info_default() {
        let info = SystemInfo::default();
        assert!(!info.os.is_empty());
        assert!(!info.architecture.is_empty());
        assert!(info.cpu_cores > 0);
    }
}
