use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use sem_core::{CancelToken, ErrorInfo, ParameterCombination, ProcessRunner, ResultStream, SemError};
use tracing::debug;

use crate::simulator::{JobLimits, Simulator};

/// Runs simulations on a fixed-size pool of worker threads.
///
/// Each worker blocks on its own child process and pushes the finished record
/// into a bounded channel; the returned stream yields records in completion
/// order.
pub struct ParallelRunner {
    simulator: Arc<Simulator>,
    limits: JobLimits,
    cancel: CancelToken,
    pool: ThreadPool,
}

impl ParallelRunner {
    /// Builds the worker pool. `workers == 0` uses one worker per CPU.
    pub fn new(simulator: Simulator, workers: usize, limits: JobLimits) -> Result<Self, SemError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("sem-worker-{idx}"))
            .build()
            .map_err(|err| {
                SemError::Runner(
                    ErrorInfo::new("sem_runner.pool", "failed to build worker pool")
                        .with_context("workers", workers.to_string())
                        .with_hint(err.to_string()),
                )
            })?;
        Ok(Self {
            simulator: Arc::new(simulator),
            limits,
            cancel: CancelToken::new(),
            pool,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}

impl std::fmt::Debug for ParallelRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelRunner")
            .field("simulator", &self.simulator)
            .field("limits", &self.limits)
            .field("workers", &self.workers())
            .finish()
    }
}

impl ProcessRunner for ParallelRunner {
    fn available_parameters(&self) -> Result<BTreeSet<String>, SemError> {
        self.simulator.available_parameters()
    }

    fn run_simulations<'a>(
        &'a self,
        params: Vec<ParameterCombination>,
        output_dir: &Path,
    ) -> Result<ResultStream<'a>, SemError> {
        let flag = self.cancel.begin_batch();
        let total = params.len();
        let (tx, rx) = mpsc::sync_channel(self.workers().max(1));
        debug!(jobs = total, workers = self.workers(), "dispatching to worker pool");
        for combination in params {
            let tx = tx.clone();
            let simulator = Arc::clone(&self.simulator);
            let flag = flag.clone();
            let limits = self.limits;
            let output_dir = output_dir.to_path_buf();
            self.pool.spawn(move || {
                let result = simulator.execute(&combination, &output_dir, &limits, &flag);
                // A dropped receiver means the consumer gave up on this batch.
                if tx.send(result).is_err() {
                    flag.cancel();
                }
            });
        }
        drop(tx);
        Ok(ResultStream::new(total, rx.into_iter()))
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
