//! Sequential and random reads of a pre-existing file.
//!
//! The file is split into `times * threads` blocks of `size` bytes. Random
//! mode shuffles the block indices once, before any worker starts, and gives
//! worker `i` the contiguous slice `[i*times, (i+1)*times)` of the shuffled
//! order. The slices are a disjoint cover of every block, so workers hit
//! scattered but never overlapping regions. Sequential mode reads worker
//! `i`'s own contiguous byte range.

use crate::error::{BenchError, Result};
use crate::pool::{WorkerContext, WorkerOperation};
use crate::utils::required_read_bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Sequential,
    Random,
}

#[derive(Debug, Clone)]
pub struct DiskReadOp {
    path: PathBuf,
    mode: ReadMode,
    times: u64,
    size_in_bytes: usize,
    /// Shuffled block indices; empty in sequential mode.
    blocks: Vec<u64>,
}

impl DiskReadOp {
    /// Validate the target file and build the shared read plan.
    ///
    /// Fails before any worker exists when the file is missing or shorter
    /// than `times * threads * size` bytes.
    pub fn prepare(
        path: &Path,
        mode: ReadMode,
        times: u64,
        size_in_bytes: usize,
        threads: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        let required = required_read_bytes(times, threads, size_in_bytes)?;
        let meta = fs::metadata(path).map_err(|_| BenchError::MissingFile {
            path: path.to_path_buf(),
        })?;
        if meta.len() < required {
            return Err(BenchError::FileTooSmall {
                path: path.to_path_buf(),
                actual: meta.len(),
                times,
                threads,
                size: size_in_bytes,
                required,
            });
        }

        let blocks = match mode {
            ReadMode::Sequential => Vec::new(),
            ReadMode::Random => {
                let count = times * threads as u64;
                match seed {
                    Some(seed) => plan_blocks(count, &mut StdRng::seed_from_u64(seed))?,
                    None => plan_blocks(count, &mut rand::thread_rng())?,
                }
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            times,
            size_in_bytes,
            blocks,
        })
    }

    /// Block indices read by worker `index` in random mode.
    pub fn partition(&self, index: usize) -> &[u64] {
        let times = self.times as usize;
        let start = (index * times).min(self.blocks.len());
        let end = (start + times).min(self.blocks.len());
        &self.blocks[start..end]
    }

    fn block_offset(&self, block: u64) -> u64 {
        block * self.size_in_bytes as u64
    }
}

/// `[0, count)` in random order (Fisher-Yates).
///
/// The plan holds one index per block, so huge files can exceed memory;
/// that is reported as [`BenchError::Allocation`] rather than aborting.
pub fn plan_blocks<R: Rng + ?Sized>(count: u64, rng: &mut R) -> Result<Vec<u64>> {
    let bytes = count.saturating_mul(std::mem::size_of::<u64>() as u64);
    let too_big = || BenchError::Allocation {
        size: usize::try_from(bytes).unwrap_or(usize::MAX),
    };
    let len = usize::try_from(count).map_err(|_| too_big())?;

    let mut blocks = Vec::new();
    blocks.try_reserve_exact(len).map_err(|_| too_big())?;
    blocks.extend(0..count);
    blocks.shuffle(rng);
    Ok(blocks)
}

impl WorkerOperation for DiskReadOp {
    fn name(&self) -> &'static str {
        match self.mode {
            ReadMode::Sequential => "disk_r_seq",
            ReadMode::Random => "disk_r_ran",
        }
    }

    fn run_worker(&self, ctx: &WorkerContext<'_>) -> Result<f64> {
        let mut buffer = super::filled_buffer(self.size_in_bytes, 0)?;
        let mut file = File::open(&self.path).map_err(|source| BenchError::Open {
            path: self.path.clone(),
            source,
        })?;

        match self.mode {
            ReadMode::Sequential => {
                let first_block = ctx.index as u64 * self.times;
                self.seek(&mut file, first_block)?;
                debug!(
                    "Worker #{} reading {} blocks from block {}",
                    ctx.index, self.times, first_block
                );

                let start = Instant::now();
                for iteration in 0..self.times {
                    ctx.check()?;
                    self.read_block(&mut file, &mut buffer, iteration)?;
                }
                Ok(start.elapsed().as_secs_f64())
            }
            ReadMode::Random => {
                let blocks = self.partition(ctx.index);
                debug!("Worker #{} reading {} scattered blocks", ctx.index, blocks.len());

                let start = Instant::now();
                for (iteration, &block) in blocks.iter().enumerate() {
                    ctx.check()?;
                    self.seek(&mut file, block)?;
                    self.read_block(&mut file, &mut buffer, iteration as u64)?;
                }
                Ok(start.elapsed().as_secs_f64())
            }
        }
    }
}

impl DiskReadOp {
    fn seek(&self, file: &mut File, block: u64) -> Result<()> {
        file.seek(SeekFrom::Start(self.block_offset(block)))
            .map_err(|source| BenchError::io(&self.path, source))?;
        Ok(())
    }

    fn read_block(&self, file: &mut File, buffer: &mut [u8], iteration: u64) -> Result<()> {
        let read =
            super::read_full(file, buffer).map_err(|source| BenchError::io(&self.path, source))?;
        if read != buffer.len() {
            return Err(BenchError::ShortRead {
                path: self.path.clone(),
                read,
                iteration,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use std::io::Write;

    fn file_of(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0x5Au8; len]).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_partitions_are_a_disjoint_cover() {
        let file = file_of(10 * 4 * 16);
        let op = DiskReadOp::prepare(file.path(), ReadMode::Random, 10, 16, 4, Some(7)).unwrap();

        let mut all: Vec<u64> = (0..4).flat_map(|i| op.partition(i).to_vec()).collect();
        assert!((0..4).all(|i| op.partition(i).len() == 10));
        all.sort_unstable();
        assert_eq!(all, (0..40).collect::<Vec<u64>>());
    }

    #[test]
    fn test_plan_blocks_is_seeded_permutation() {
        let a = plan_blocks(100, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = plan_blocks(100, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_plan_too_large_is_an_allocation_error() {
        let err = plan_blocks(u64::MAX, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, BenchError::Allocation { .. }));
        assert!(err.to_string().starts_with("Can't allocate"));
    }

    #[test]
    fn test_prepare_rejects_small_file() {
        let file = file_of(1000);
        let err = DiskReadOp::prepare(file.path(), ReadMode::Random, 100, 4096, 4, None)
            .unwrap_err();
        match err {
            BenchError::FileTooSmall {
                actual, required, ..
            } => {
                assert_eq!(actual, 1000);
                assert_eq!(required, 1_638_400);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prepare_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiskReadOp::prepare(
            &dir.path().join("absent"),
            ReadMode::Sequential,
            1,
            1,
            1,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::MissingFile { .. }));
    }

    #[test]
    fn test_both_modes_read_whole_file() {
        let file = file_of(8 * 3 * 512);
        for mode in [ReadMode::Sequential, ReadMode::Random] {
            let op = DiskReadOp::prepare(file.path(), mode, 8, 512, 3, Some(3)).unwrap();
            let results = WorkerPool::new(3).run(&op).unwrap();
            assert_eq!(results.len(), 3);
        }
    }
}
