//! Error taxonomy shared by every benchmark.
//!
//! Every variant except [`BenchError::Config`] is fatal for the run: the
//! binary prints the message prefixed with `Error:` and exits CRITICAL.
//! Configuration errors take the usage path instead.
//!
//! Messages never repeat their `source`; the binary prints the whole cause
//! chain on one line.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Invalid or missing command-line parameters.
    #[error("{0}")]
    Config(String),

    #[error("Can't allocate {size} bytes on memory")]
    Allocation { size: usize },

    #[error("Can't open the target file {path}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} must be a folder")]
    NotAFolder { path: PathBuf },

    #[error("Can't create the folder {path}")]
    CreateFolder {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Can't find the target file {path}")]
    MissingFile { path: PathBuf },

    #[error(
        "The size of the file {path} is {actual} bytes and must be greater or equal to \
         {times}*{threads}*{size} = {required} bytes"
    )]
    FileTooSmall {
        path: PathBuf,
        actual: u64,
        times: u64,
        threads: usize,
        size: usize,
        required: u64,
    },

    #[error("Can't write {expected} bytes to {path} (wrote {written})")]
    ShortWrite {
        path: PathBuf,
        expected: usize,
        written: usize,
    },

    #[error("Read just {read} bytes from {path} on {iteration}-th iteration")]
    ShortRead {
        path: PathBuf,
        read: usize,
        iteration: u64,
    },

    #[error("Can't flush after writing {iteration}-th block on {path}")]
    Flush {
        path: PathBuf,
        iteration: u64,
        source: std::io::Error,
    },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP GET of {url} failed")]
    Http { url: String, source: reqwest::Error },

    #[error("Can't open the reference file {path}")]
    Reference {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Zero responses received when sending {times} echo requests to {host}")]
    NoReplies { times: u64, host: String },

    #[error("Can't ping {host}: {detail}")]
    Ping { host: String, detail: String },

    #[error("Can't create the {index}-th worker thread")]
    Spawn {
        index: usize,
        source: std::io::Error,
    },

    #[error("Worker #{index} panicked")]
    WorkerPanic { index: usize },

    /// A sibling worker failed and this one stopped early.
    #[error("Worker #{index} cancelled")]
    Cancelled { index: usize },

    #[error("Runtime failure: {0}")]
    Runtime(String),
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs on the usage path rather than the fatal one.
    pub fn is_config(&self) -> bool {
        matches!(self, BenchError::Config(_))
    }
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;
