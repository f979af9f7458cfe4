use crate::error::{BenchError, Result};
use crate::pool::WorkerResult;
use serde::{Deserialize, Serialize};

/// Result of one ping run.
///
/// `latency_ms` is absent when no reply carried a usable round-trip time,
/// `loss_percent` is absent when the provider could not tell how many
/// requests were answered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingResponse {
    pub latency_ms: Option<f64>,
    pub loss_percent: Option<f64>,
}

impl PingResponse {
    pub fn new(latency_ms: f64, loss_percent: f64) -> Self {
        Self {
            latency_ms: Some(latency_ms),
            loss_percent: Some(loss_percent),
        }
    }

    /// Build a response from request/reply counts and the summed latency.
    pub fn from_counts(sent: u64, received: u64, total_latency_ms: f64) -> Self {
        let latency_ms = (received > 0).then(|| total_latency_ms / received as f64);
        Self {
            latency_ms,
            loss_percent: Some(loss_percent(sent, received)),
        }
    }

    pub fn is_total_loss(&self) -> bool {
        self.loss_percent.is_some_and(|loss| loss >= 100.0)
    }
}

/// `100 * (sent - received) / sent`, clamped for replies counted twice.
pub fn loss_percent(sent: u64, received: u64) -> f64 {
    if sent == 0 {
        return 100.0;
    }
    let lost = sent.saturating_sub(received);
    100.0 * lost as f64 / sent as f64
}

/// The value a classifier consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregateMetric {
    /// Mean elapsed seconds per worker (mem, disk).
    Elapsed { seconds: f64 },
    /// Mean elapsed seconds and mean calculations per second per worker.
    Cpu { seconds: f64, calcs_per_second: f64 },
    /// One timed transfer and whether its body matched the reference.
    HttpGet { seconds: f64, differs: bool },
    Ping(PingResponse),
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Iterations per second of one worker; zero when the clock did not advance.
pub fn throughput(times: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        times as f64 / seconds
    } else {
        0.0
    }
}

/// Reduce pool samples to the mean elapsed time.
///
/// Workers run concurrently, so the mean approximates what one worker
/// experiences under contention.
pub fn aggregate_elapsed(samples: &[WorkerResult]) -> Result<AggregateMetric> {
    ensure_samples(samples)?;
    let seconds: Vec<f64> = samples.iter().map(|s| s.seconds).collect();
    Ok(AggregateMetric::Elapsed {
        seconds: mean(&seconds),
    })
}

/// Reduce CPU samples to mean seconds and mean per-worker throughput.
pub fn aggregate_cpu(samples: &[WorkerResult], times: u64) -> Result<AggregateMetric> {
    ensure_samples(samples)?;
    let seconds: Vec<f64> = samples.iter().map(|s| s.seconds).collect();
    let rates: Vec<f64> = seconds.iter().map(|&s| throughput(times, s)).collect();
    Ok(AggregateMetric::Cpu {
        seconds: mean(&seconds),
        calcs_per_second: mean(&rates),
    })
}

fn ensure_samples(samples: &[WorkerResult]) -> Result<()> {
    if samples.is_empty() {
        return Err(BenchError::Runtime(
            "Cannot aggregate an empty set of worker results".to_string(),
        ));
    }
    Ok(())
}
