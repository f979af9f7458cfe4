//! # Worker pool
//!
//! Runs `threads` independent copies of one [`WorkerOperation`] and collects
//! one elapsed-time sample per worker. Workers share nothing mutable during
//! their timed loop except the cancellation flag, which the first failing
//! worker raises so its siblings stop between iterations.
//!
//! The pool always joins every worker before returning. The result is either
//! all samples in spawn order or the first real failure.

use crate::error::{BenchError, Result};
use crate::utils::pin_current_thread;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Elapsed time of one worker's full batch of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub index: usize,
    pub seconds: f64,
}

/// Per-worker view handed to an operation.
pub struct WorkerContext<'a> {
    pub index: usize,
    cancelled: &'a AtomicBool,
}

impl<'a> WorkerContext<'a> {
    pub fn new(index: usize, cancelled: &'a AtomicBool) -> Self {
        Self { index, cancelled }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Bail out if a sibling worker already failed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BenchError::Cancelled { index: self.index });
        }
        Ok(())
    }
}

/// A benchmark body that one worker runs to completion.
pub trait WorkerOperation: Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Run every iteration of this worker and return the elapsed seconds
    /// of the timed loop.
    fn run_worker(&self, ctx: &WorkerContext<'_>) -> Result<f64>;
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    threads: usize,
    affinity: Option<usize>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            affinity: None,
        }
    }

    /// Pin worker `i` to core `(first_core + i) % cores`.
    pub fn with_affinity(mut self, first_core: Option<usize>) -> Self {
        self.affinity = first_core;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Execute `op` on every worker and wait for all of them.
    pub fn run<O>(&self, op: &O) -> Result<Vec<WorkerResult>>
    where
        O: WorkerOperation + ?Sized,
    {
        let cancelled = AtomicBool::new(false);

        if self.threads == 1 {
            debug!("Running {} inline on the calling thread", op.name());
            let seconds = self.run_one(op, 0, &cancelled)?;
            return Ok(vec![WorkerResult { index: 0, seconds }]);
        }

        debug!("Let's create {} {} workers", self.threads, op.name());
        let outcomes: Vec<Result<f64>> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.threads);
            for index in 0..self.threads {
                let cancelled = &cancelled;
                let spawned = std::thread::Builder::new()
                    .name(format!("sbench-worker-{}", index))
                    .spawn_scoped(scope, move || self.run_one(op, index, cancelled));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        cancelled.store(true, Ordering::Relaxed);
                        handles.clear();
                        // Workers already running are joined when the scope ends.
                        return vec![Err(BenchError::Spawn { index, source })];
                    }
                }
            }

            debug!("Workers created, waiting for completion");
            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        cancelled.store(true, Ordering::Relaxed);
                        Err(BenchError::WorkerPanic { index })
                    })
                })
                .collect()
        });

        collect_results(outcomes)
    }

    fn run_one<O>(&self, op: &O, index: usize, cancelled: &AtomicBool) -> Result<f64>
    where
        O: WorkerOperation + ?Sized,
    {
        if let Some(first_core) = self.affinity {
            if !pin_current_thread(first_core + index) {
                warn!("Can't pin worker #{} to a CPU core", index);
            }
        }

        let ctx = WorkerContext::new(index, cancelled);
        match op.run_worker(&ctx) {
            Ok(seconds) => {
                debug!("Worker #{} finished {} with delta = {:.6}", index, op.name(), seconds);
                Ok(seconds)
            }
            Err(e) => {
                cancelled.store(true, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

/// Keep spawn order; report the first failure that is not a cancellation.
fn collect_results(outcomes: Vec<Result<f64>>) -> Result<Vec<WorkerResult>> {
    let mut results = Vec::with_capacity(outcomes.len());
    let mut first_cancel = None;
    let mut first_error = None;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(seconds) => results.push(WorkerResult { index, seconds }),
            Err(e @ BenchError::Cancelled { .. }) => {
                first_cancel.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error.or(first_cancel) {
        Some(e) => Err(e),
        None => Ok(results),
    }
}
