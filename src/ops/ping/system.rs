use super::{PingProvider, PingRequest};
use crate::error::{BenchError, Result};
use crate::metrics::PingResponse;
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

/// Counters and average round trip scraped from `ping` output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingSummary {
    pub transmitted: u64,
    pub received: u64,
    pub avg_ms: Option<f64>,
}

/// Runs `ping -n -s <size> -c <times> <host>`.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
}

impl SystemPing {
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PingProvider for SystemPing {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn ping(&self, request: &PingRequest) -> Result<PingResponse> {
        debug!(
            "Running {} -n -s {} -c {} {}",
            self.program, request.size_in_bytes, request.times, request.host
        );
        let output = Command::new(&self.program)
            .arg("-n")
            .arg("-s")
            .arg(request.size_in_bytes.to_string())
            .arg("-c")
            .arg(request.times.to_string())
            .arg(&request.host)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BenchError::Ping {
                host: request.host.clone(),
                detail: format!("can't run {}: {}", self.program, e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = parse_ping_output(&stdout).map_err(|detail| BenchError::Ping {
            host: request.host.clone(),
            detail,
        })?;
        Ok(interpret(request.times, summary, output.status.success()))
    }
}

/// Turn a scraped summary into latency and loss.
///
/// No summary from a failed process means nothing came back. No summary
/// from a successful one is unreadable and yields an empty response.
fn interpret(times: u64, summary: Option<PingSummary>, succeeded: bool) -> PingResponse {
    match summary {
        Some(summary) => {
            if summary.transmitted != times {
                debug!("Requested {} echo requests, ping sent {}", times, summary.transmitted);
            }
            match (summary.received, summary.avg_ms) {
                (0, _) => PingResponse::from_counts(times, 0, 0.0),
                (received, Some(avg)) => {
                    PingResponse::from_counts(times, received, avg * received as f64)
                }
                (received, None) => {
                    warn!("ping reported {} replies but no round-trip statistics", received);
                    PingResponse {
                        latency_ms: None,
                        loss_percent: Some(crate::metrics::loss_percent(times, received)),
                    }
                }
            }
        }
        None if !succeeded => PingResponse::from_counts(times, 0, 0.0),
        None => {
            warn!("Can't find a summary in the ping output");
            PingResponse {
                latency_ms: None,
                loss_percent: None,
            }
        }
    }
}

/// Extract the packet counters and the average round trip.
///
/// Handles the iputils, BSD/macOS and busybox summaries:
///
/// ```text
/// 4 packets transmitted, 4 received, 0% packet loss, time 3004ms
/// rtt min/avg/max/mdev = 0.031/0.045/0.061/0.011 ms
/// 4 packets transmitted, 4 packets received, 0.0% packet loss
/// round-trip min/avg/max/stddev = 10.1/12.3/14.2/1.5 ms
/// ```
pub fn parse_ping_output(output: &str) -> std::result::Result<Option<PingSummary>, String> {
    let counters = Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
        .map_err(|e| e.to_string())?;
    let rtt = Regex::new(r"= ([0-9.]+)/([0-9.]+)/([0-9.]+)(?:/([0-9.]+))? ?ms")
        .map_err(|e| e.to_string())?;

    let Some(caps) = counters.captures(output) else {
        return Ok(None);
    };
    let transmitted = caps[1]
        .parse::<u64>()
        .map_err(|e| format!("bad transmitted counter: {}", e))?;
    let received = caps[2]
        .parse::<u64>()
        .map_err(|e| format!("bad received counter: {}", e))?;
    let avg_ms = rtt
        .captures(output)
        .and_then(|caps| caps[2].parse::<f64>().ok());

    Ok(Some(PingSummary {
        transmitted,
        received,
        avg_ms,
    }))
}
