//! # Threshold classification
//!
//! Maps an aggregate metric onto a monitoring verdict. Every metric uses
//! greater-is-worse semantics: `metric >= crit` is CRITICAL, otherwise
//! `metric >= warn` is WARNING, otherwise OK.
//!
//! CPU throughput is classified the same way even though a higher rate is
//! better, so a CPU critical threshold trips on a *fast* machine. Callers
//! that want "too slow" alerts must invert their thresholds themselves.

use crate::error::{BenchError, Result};
use crate::metrics::{AggregateMetric, PingResponse};
use serde::{Deserialize, Serialize};

/// Outcome of a classified run, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Verdict {
    /// Process exit code of this verdict.
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Ok => 0,
            Verdict::Warning => 1,
            Verdict::Critical => 2,
            Verdict::Unknown => 3,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Ok => "OK",
            Verdict::Warning => "WARNING",
            Verdict::Critical => "CRITICAL",
            Verdict::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A warning/critical pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds<T> {
    pub warn: T,
    pub crit: T,
}

/// Limits for the two ping sub-metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingLimits {
    pub latency_ms: f64,
    pub loss_percent: f64,
}

/// Thresholds as configured for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThresholdSpec {
    Scalar(Thresholds<f64>),
    Ping(Thresholds<PingLimits>),
}

/// Classify one scalar metric.
pub fn classify(metric: f64, thresholds: &Thresholds<f64>) -> Verdict {
    if metric >= thresholds.crit {
        Verdict::Critical
    } else if metric >= thresholds.warn {
        Verdict::Warning
    } else {
        Verdict::Ok
    }
}

/// Classify a ping result by its worse sub-metric.
///
/// Missing latency is only consistent with total loss; anything else is
/// UNKNOWN. With total loss the verdict comes from the loss limits alone.
pub fn classify_ping(response: &PingResponse, thresholds: &Thresholds<PingLimits>) -> Verdict {
    let Some(loss) = response.loss_percent else {
        return Verdict::Unknown;
    };
    if response.latency_ms.is_none() && !response.is_total_loss() {
        return Verdict::Unknown;
    }

    let loss_verdict = classify(
        loss,
        &Thresholds {
            warn: thresholds.warn.loss_percent,
            crit: thresholds.crit.loss_percent,
        },
    );
    let latency_verdict = response.latency_ms.map_or(Verdict::Ok, |latency| {
        classify(
            latency,
            &Thresholds {
                warn: thresholds.warn.latency_ms,
                crit: thresholds.crit.latency_ms,
            },
        )
    });
    loss_verdict.max(latency_verdict)
}

/// Classify an HTTP GET. Differing content is CRITICAL before any timing check.
pub fn classify_http(seconds: f64, differs: bool, thresholds: &Thresholds<f64>) -> Verdict {
    if differs {
        return Verdict::Critical;
    }
    classify(seconds, thresholds)
}

/// Classify an aggregate metric against the configured thresholds.
pub fn classify_metric(metric: &AggregateMetric, spec: &ThresholdSpec) -> Result<Verdict> {
    match (metric, spec) {
        (AggregateMetric::Elapsed { seconds }, ThresholdSpec::Scalar(t)) => {
            Ok(classify(*seconds, t))
        }
        (
            AggregateMetric::Cpu {
                calcs_per_second, ..
            },
            ThresholdSpec::Scalar(t),
        ) => Ok(classify(*calcs_per_second, t)),
        (AggregateMetric::HttpGet { seconds, differs }, ThresholdSpec::Scalar(t)) => {
            Ok(classify_http(*seconds, *differs, t))
        }
        (AggregateMetric::Ping(response), ThresholdSpec::Ping(t)) => {
            Ok(classify_ping(response, t))
        }
        _ => Err(BenchError::config(
            "Thresholds do not match the benchmark type",
        )),
    }
}
