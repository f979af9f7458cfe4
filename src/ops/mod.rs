//! Timed operation providers.
//!
//! Each provider wraps one primitive action and times only its iteration
//! loop (or its single external call). Pool-backed providers implement
//! [`WorkerOperation`](crate::pool::WorkerOperation); HTTP GET and ping run
//! once per process.

pub mod cpu;
pub mod disk_read;
pub mod disk_write;
pub mod http_get;
pub mod mem;
pub mod ping;

pub use cpu::CpuOp;
pub use disk_read::{DiskReadOp, ReadMode};
pub use disk_write::DiskWriteOp;
pub use http_get::{HttpGetOp, HttpGetOutcome};
pub use mem::MemOp;
pub use ping::{PingProvider, PingProviderFactory, PingRequest};

/// Byte written into memory and disk buffers to force real commits.
pub const SENTINEL: u8 = 0xA5;

/// Allocate a `size`-byte buffer filled with `fill`, reporting failure
/// instead of aborting the process.
pub(crate) fn filled_buffer(size: usize, fill: u8) -> crate::error::Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| crate::error::BenchError::Allocation { size })?;
    buffer.resize(size, fill);
    Ok(buffer)
}

/// Read until `buffer` is full or the reader hits end of file.
pub(crate) fn read_full<R: std::io::Read>(
    reader: &mut R,
    buffer: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
