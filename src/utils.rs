//! # Utility Functions and Helper Module
//!
//! Small helpers shared by the benchmarks: parameter validation with clear
//! error messages, CPU core discovery and pinning, and resolution of the
//! folder used for temporary files.

use crate::error::{BenchError, Result};
use std::path::PathBuf;

/// Upper bound for the worker count.
pub const MAX_THREADS: usize = 1024;

/// Validate the number of worker threads
///
/// Rejects zero (nothing would be measured) and anything above
/// [`MAX_THREADS`], which would mostly measure the scheduler.
///
/// ```rust
/// # use sbench::utils::validate_threads;
/// assert!(validate_threads(1).is_ok());
/// assert!(validate_threads(0).is_err());
/// ```
pub fn validate_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        return Err(BenchError::config("Number of threads must be at least 1"));
    }
    if threads > MAX_THREADS {
        return Err(BenchError::config(format!(
            "Number of threads {} is too high (max {})",
            threads, MAX_THREADS
        )));
    }
    Ok(())
}

/// Total bytes a disk read touches: `times * threads * size`.
///
/// Fails on overflow instead of wrapping, so the file size check can't be
/// fooled by absurd parameters.
pub fn required_read_bytes(times: u64, threads: usize, size: usize) -> Result<u64> {
    times
        .checked_mul(threads as u64)
        .and_then(|blocks| blocks.checked_mul(size as u64))
        .ok_or_else(|| BenchError::config("times*threads*sizeInBytes overflows"))
}

/// Number of logical CPU cores.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Pin the calling thread to core `core % available_cores`.
///
/// Returns `false` when the platform does not expose core ids or refuses
/// the request.
pub fn pin_current_thread(core: usize) -> bool {
    match core_affinity::get_core_ids() {
        Some(ids) if !ids.is_empty() => core_affinity::set_for_current(ids[core % ids.len()]),
        _ => false,
    }
}

/// Folder for temporary files
///
/// First of `$TMPDIR`, `$TMP`, `$TEMP` and `$TEMPDIR` that is set and
/// non-empty, falling back to `/tmp`.
pub fn temp_folder() -> PathBuf {
    temp_folder_from(|name| std::env::var_os(name))
}

fn temp_folder_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<std::ffi::OsString>,
{
    ["TMPDIR", "TMP", "TEMP", "TEMPDIR"]
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_validate_threads() {
        assert!(validate_threads(1).is_ok());
        assert!(validate_threads(8).is_ok());
        assert!(validate_threads(MAX_THREADS).is_ok());
        assert!(validate_threads(0).is_err());
        assert!(validate_threads(MAX_THREADS + 1).is_err());
    }

    #[test]
    fn test_required_read_bytes() {
        assert_eq!(required_read_bytes(100, 4, 4096).unwrap(), 1_638_400);
        assert!(required_read_bytes(u64::MAX, 2, 2).is_err());
    }

    #[test]
    fn test_get_cpu_cores() {
        assert!(get_cpu_cores() > 0);
    }

    #[test]
    fn test_temp_folder_precedence() {
        let folder = temp_folder_from(|name| match name {
            "TMP" => Some(OsString::from("/var/tmp")),
            "TEMP" => Some(OsString::from("/other")),
            _ => None,
        });
        assert_eq!(folder, PathBuf::from("/var/tmp"));

        let folder = temp_folder_from(|name| match name {
            "TMPDIR" => Some(OsString::new()),
            "TEMPDIR" => Some(OsString::from("/scratch")),
            _ => None,
        });
        assert_eq!(folder, PathBuf::from("/scratch"));

        assert_eq!(temp_folder_from(|_| None), PathBuf::from("/tmp"));
    }
}
