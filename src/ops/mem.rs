use super::{filled_buffer, SENTINEL};
use crate::error::Result;
use crate::pool::{WorkerContext, WorkerOperation};
use std::hint::black_box;
use std::time::Instant;
use tracing::{debug, trace};

/// Allocates, commits and frees a heap block `times` times.
///
/// Filling every byte forces physical pages to be committed instead of
/// only reserving address space.
#[derive(Debug, Clone)]
pub struct MemOp {
    pub times: u64,
    pub size_in_bytes: usize,
}

impl MemOp {
    pub fn new(times: u64, size_in_bytes: usize) -> Self {
        Self {
            times,
            size_in_bytes,
        }
    }
}

impl WorkerOperation for MemOp {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn run_worker(&self, ctx: &WorkerContext<'_>) -> Result<f64> {
        debug!(
            "Worker #{} will allocate {} bytes {} times",
            ctx.index, self.size_in_bytes, self.times
        );

        let start = Instant::now();
        for i in 0..self.times {
            ctx.check()?;
            let block = filled_buffer(self.size_in_bytes, SENTINEL)?;
            black_box(&block);
            drop(block);
            trace!("Worker #{} committed block #{}", ctx.index, i);
        }
        Ok(start.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::pool::WorkerPool;

    #[test]
    fn test_mem_op_runs_all_workers() {
        let results = WorkerPool::new(3).run(&MemOp::new(5, 1 << 20)).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.seconds >= 0.0));
    }

    #[test]
    fn test_mem_op_fails_on_impossible_allocation() {
        let err = WorkerPool::new(1)
            .run(&MemOp::new(1, usize::MAX))
            .unwrap_err();
        assert!(matches!(err, BenchError::Allocation { size } if size == usize::MAX));
    }
}
