//! Diagnostic logging.
//!
//! stdout carries nothing but the report line, so every log event goes to
//! stderr (colorized by level) and, with `--log-file`, to a plain-text file.
//! The default filter is `warn`, `debug` with `-v`; `RUST_LOG` overrides
//! both.

use anyhow::{Context, Result};
use colored::*;
use std::fmt;
use std::path::Path;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Colors each stderr line by level.
///
/// Plain runs only ever show warnings and errors, so the message stands
/// alone. With `-v` every line is prefixed with its level and the emitting
/// module (`DEBUG disk_read: ...`) to tell worker and runner events apart.
pub struct ColorizedFormatter {
    verbose: bool,
}

impl ColorizedFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

/// Prefix of a verbose line: padded level and the last path segment of the
/// event target.
fn verbose_prefix(level: &Level, target: &str) -> String {
    let module = target.rsplit("::").next().unwrap_or(target);
    format!("{:>5} {}: ", level, module)
}

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut buffer = if self.verbose {
            verbose_prefix(metadata.level(), metadata.target())
        } else {
            String::new()
        };
        // format_fields writes straight through, so buffer to color the line.
        ctx.format_fields(Writer::new(&mut buffer), event)?;

        let line = match *metadata.level() {
            Level::INFO => buffer.white(),
            Level::WARN => buffer.yellow(),
            Level::ERROR => buffer.red().bold(),
            Level::DEBUG => buffer.blue(),
            Level::TRACE => buffer.dimmed(),
        };

        writeln!(writer, "{}", line)
    }
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live until
/// the process exits.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(ColorizedFormatter::new(verbose))
        .with_writer(std::io::stderr)
        .with_filter(env_filter(verbose));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            std::fs::create_dir_all(directory).with_context(|| {
                format!("Failed to create log directory {}", directory.display())
            })?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter(verbose));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}
