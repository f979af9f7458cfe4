use crate::benchmark::{BenchmarkParams, Target};
use crate::error::{BenchError, Result};
use crate::threshold::{PingLimits, ThresholdSpec, Thresholds};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const USAGE_EXAMPLES: &str = "\
Parameters (-p) per type:
  cpu         times
  mem         times,sizeInBytes
  disk_w      times,sizeInBytes,folderName
  disk_r_seq  times,sizeInBytes,fileName
  disk_r_ran  times,sizeInBytes,fileName
  http_get    refName,url
  ping        times,sizeInBytes,host

Examples:
  * Allocate and commit 10 MiB of RAM 10 times:
      sbench -t mem -p 10,10485760
  * Silly calculus (2 pows) 100E6 times on 4 threads:
      sbench -t cpu -p 100000000 -n 4
  * Write 100 MiB in 4k blocks, warning at 5 s, critical at 10 s:
      sbench -t disk_w -p 25600,4096,/tmp/_sbench.d -w 5 -c 10
  * Random read 100 MiB in 4k blocks:
      sbench -t disk_r_ran -p 25600,4096,/tmp/_sbench.testfile
  * Download a file and compare it with <refs-folder>/my_ref_file:
      sbench -t http_get -p my_ref_file,http://www.test.com/file
  * Ping 4 times, warning at 100 ms or 20 % loss, critical at 200 ms or 50 % loss:
      sbench -t ping -p 4,56,example.org -w 100,20 -c 200,50";

/// Simple benchmarks: time CPU, memory, disk, HTTP and ping operations
#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(version, about, long_about = None, after_help = USAGE_EXAMPLES)]
pub struct Args {
    /// Benchmark type
    #[clap(short = 't', long = "type", value_enum)]
    pub kind: BenchmarkKind,

    /// Comma-separated benchmark parameters (see below)
    #[clap(short = 'p', long)]
    pub params: String,

    /// Number of worker threads (cpu, mem, disk_w, disk_r_*)
    #[clap(short = 'n', long, default_value_t = crate::defaults::THREADS)]
    pub threads: usize,

    /// Warning threshold (ping: latencyMs,lossPercent)
    #[clap(short = 'w', long, requires = "critical")]
    pub warning: Option<String>,

    /// Critical threshold (ping: latencyMs,lossPercent)
    #[clap(short = 'c', long, requires = "warning")]
    pub critical: Option<String>,

    /// Verbose output on stderr
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Report format written to stdout
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Folder holding the HTTP reference files
    #[clap(long, default_value = crate::defaults::HTTP_REFS_FOLDER)]
    pub refs_folder: PathBuf,

    /// How ICMP echo requests are sent
    #[clap(long, value_enum, default_value_t = PingProviderKind::System)]
    pub ping_provider: PingProviderKind,

    /// Pin worker i to CPU core (CORE + i) modulo the core count
    #[clap(long, value_name = "CORE")]
    pub affinity: Option<usize>,

    /// Seed for the disk read block shuffle
    #[clap(long)]
    pub seed: Option<u64>,

    /// Also write logs to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

/// Same values clap fills in for omitted flags.
impl Default for Args {
    fn default() -> Self {
        Self {
            kind: BenchmarkKind::default(),
            params: String::new(),
            threads: crate::defaults::THREADS,
            warning: None,
            critical: None,
            verbose: false,
            format: OutputFormat::Text,
            refs_folder: PathBuf::from(crate::defaults::HTTP_REFS_FOLDER),
            ping_provider: PingProviderKind::System,
            affinity: None,
            seed: None,
            log_file: None,
        }
    }
}

/// Available benchmark types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkKind {
    /// Floating point iteration
    #[default]
    #[clap(name = "cpu")]
    Cpu,

    /// Heap allocate, commit and free
    #[clap(name = "mem")]
    Mem,

    /// Durable sequential writes
    #[clap(name = "disk_w")]
    DiskWrite,

    /// Sequential reads of an existing file
    #[clap(name = "disk_r_seq")]
    DiskReadSeq,

    /// Random reads of an existing file
    #[clap(name = "disk_r_ran")]
    DiskReadRandom,

    /// Timed HTTP GET compared against a reference file
    #[clap(name = "http_get")]
    HttpGet,

    /// ICMP echo latency and loss
    #[clap(name = "ping")]
    Ping,
}

impl std::fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl BenchmarkKind {
    /// Label used at the start of a classified report line.
    pub fn label(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu => "Cpu",
            BenchmarkKind::Mem => "Mem",
            BenchmarkKind::DiskWrite => "DiskWrite",
            BenchmarkKind::DiskReadSeq => "DiskReadSeq",
            BenchmarkKind::DiskReadRandom => "DiskReadRandom",
            BenchmarkKind::HttpGet => "HttpGet",
            BenchmarkKind::Ping => "Ping",
        }
    }

    /// Key of the performance-data tag.
    pub fn perfdata_key(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu => "cpu",
            BenchmarkKind::Mem => "mem",
            BenchmarkKind::DiskWrite => "disk_w",
            BenchmarkKind::DiskReadSeq => "disk_r_seq",
            BenchmarkKind::DiskReadRandom => "disk_r_ran",
            BenchmarkKind::HttpGet => "http_get",
            BenchmarkKind::Ping => "latency",
        }
    }

    /// Whether the kind runs on the worker pool.
    pub fn is_pooled(&self) -> bool {
        !matches!(self, BenchmarkKind::HttpGet | BenchmarkKind::Ping)
    }

    fn params_format(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu => "times",
            BenchmarkKind::Mem => "times,sizeInBytes",
            BenchmarkKind::DiskWrite => "times,sizeInBytes,folderName",
            BenchmarkKind::DiskReadSeq | BenchmarkKind::DiskReadRandom => {
                "times,sizeInBytes,fileName"
            }
            BenchmarkKind::HttpGet => "refName,url",
            BenchmarkKind::Ping => "times,sizeInBytes,host",
        }
    }
}

/// Report formats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// One plain or monitoring-plugin line
    #[default]
    #[clap(name = "text")]
    Text,

    /// A JSON run record
    #[clap(name = "json")]
    Json,
}

/// Ping implementations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum PingProviderKind {
    /// Run the system `ping` executable and parse its output
    #[default]
    #[clap(name = "system")]
    System,

    /// Send echo requests from an unprivileged ICMP socket
    #[clap(name = "native")]
    Native,
}

/// Largest ICMP payload that fits in an IPv4 datagram.
const MAX_PING_PAYLOAD: usize = 65_507;

/// Parse the `-p` string of `kind` into typed parameters.
///
/// The last field always takes the remainder of the string, so folder
/// names and URLs may contain commas.
pub fn parse_params(kind: BenchmarkKind, params: &str, threads: usize) -> Result<BenchmarkParams> {
    let field_count = match kind {
        BenchmarkKind::Cpu => 1,
        BenchmarkKind::Mem | BenchmarkKind::HttpGet => 2,
        _ => 3,
    };
    let fields: Vec<&str> = params.splitn(field_count, ',').map(str::trim).collect();
    if fields.len() != field_count || fields.iter().any(|f| f.is_empty()) {
        return Err(BenchError::config(format!(
            "Params must be in \"{}\" format for type {}",
            kind.params_format(),
            kind.label()
        )));
    }

    let mut parsed = BenchmarkParams {
        times: 1,
        size_in_bytes: 0,
        threads,
        target: Target::None,
    };

    match kind {
        BenchmarkKind::HttpGet => {
            parsed.target = Target::Http {
                reference: fields[0].to_string(),
                url: fields[1].to_string(),
            };
        }
        _ => {
            parsed.times = parse_count(fields[0], "times")?;
            if field_count >= 2 {
                parsed.size_in_bytes = parse_size(fields[1], "sizeInBytes")?;
            }
            parsed.target = match kind {
                BenchmarkKind::DiskWrite => Target::Folder(PathBuf::from(fields[2])),
                BenchmarkKind::DiskReadSeq | BenchmarkKind::DiskReadRandom => {
                    Target::File(PathBuf::from(fields[2]))
                }
                BenchmarkKind::Ping => Target::Host(fields[2].to_string()),
                _ => Target::None,
            };
        }
    }

    if kind == BenchmarkKind::Ping && parsed.size_in_bytes > MAX_PING_PAYLOAD {
        return Err(BenchError::config(format!(
            "\"sizeInBytes\" must be at most {} for ping",
            MAX_PING_PAYLOAD
        )));
    }

    Ok(parsed)
}

/// Parse the warning/critical pair. Both or neither must be present.
pub fn parse_thresholds(
    kind: BenchmarkKind,
    warning: Option<&str>,
    critical: Option<&str>,
) -> Result<Option<ThresholdSpec>> {
    let (warning, critical) = match (warning, critical) {
        (None, None) => return Ok(None),
        (Some(w), Some(c)) => (w, c),
        _ => {
            return Err(BenchError::config(
                "Warning and critical thresholds must be set together",
            ))
        }
    };

    let spec = if kind == BenchmarkKind::Ping {
        ThresholdSpec::Ping(Thresholds {
            warn: parse_ping_limits(warning, "warning")?,
            crit: parse_ping_limits(critical, "critical")?,
        })
    } else {
        ThresholdSpec::Scalar(Thresholds {
            warn: parse_threshold(warning, "warning")?,
            crit: parse_threshold(critical, "critical")?,
        })
    };
    Ok(Some(spec))
}

fn parse_ping_limits(s: &str, name: &str) -> Result<PingLimits> {
    let (latency, loss) = s.split_once(',').ok_or_else(|| {
        BenchError::config(format!(
            "The {} threshold for ping must be in \"latencyMs,lossPercent\" format",
            name
        ))
    })?;
    Ok(PingLimits {
        latency_ms: parse_threshold(latency, name)?,
        loss_percent: parse_threshold(loss, name)?,
    })
}

fn parse_threshold(s: &str, name: &str) -> Result<f64> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| BenchError::config(format!("Can't parse the {} threshold \"{}\"", name, s)))?;
    if !value.is_finite() {
        return Err(BenchError::config(format!(
            "The {} threshold must be a finite number",
            name
        )));
    }
    Ok(value)
}

fn parse_count(s: &str, name: &str) -> Result<u64> {
    let value: u64 = s.parse().map_err(|_| {
        BenchError::config(format!("\"{}\" must be a positive integer, got \"{}\"", name, s))
    })?;
    if value == 0 {
        return Err(BenchError::config(format!("\"{}\" must be at least 1", name)));
    }
    Ok(value)
}

fn parse_size(s: &str, name: &str) -> Result<usize> {
    let value = parse_count(s, name)?;
    usize::try_from(value).map_err(|_| {
        BenchError::config(format!("\"{}\" does not fit in the address space", name))
    })
}
