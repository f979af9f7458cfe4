use crate::error::Result;
use crate::pool::{WorkerContext, WorkerOperation};
use std::hint::black_box;
use std::time::Instant;
use tracing::debug;

/// Iterations between cancellation checks.
const CHECK_EVERY: u64 = 1 << 16;

/// Keeps one core busy with dependent floating point powers.
///
/// Each iteration feeds the previous result back in, so nothing can be
/// hoisted or vectorized away.
#[derive(Debug, Clone)]
pub struct CpuOp {
    pub times: u64,
}

impl CpuOp {
    pub fn new(times: u64) -> Self {
        Self { times }
    }
}

impl WorkerOperation for CpuOp {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn run_worker(&self, ctx: &WorkerContext<'_>) -> Result<f64> {
        debug!("Worker #{} will perform {} calculations", ctx.index, self.times);

        let start = Instant::now();
        let mut x: f64 = 2.0;
        for i in 0..self.times {
            x = x.powf(x);
            x = x.powf(1.0 / (x - 1.0));
            if i % CHECK_EVERY == 0 {
                ctx.check()?;
            }
        }
        let elapsed = start.elapsed().as_secs_f64();
        black_box(x);
        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;

    #[test]
    fn test_cpu_op_reports_positive_time() {
        let results = WorkerPool::new(2).run(&CpuOp::new(100_000)).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.seconds > 0.0));
    }

    #[test]
    fn test_cpu_op_scales_with_iterations() {
        let pool = WorkerPool::new(1);
        let short = pool.run(&CpuOp::new(10_000)).unwrap()[0].seconds;
        let long = pool.run(&CpuOp::new(2_000_000)).unwrap()[0].seconds;
        assert!(long > short);
    }
}
