use std::time::Instant;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use sem_core::{
    ErrorInfo, ParameterCombination, ProcessRunner, RepetitionId, ResultStore, SemError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Completion counter handed to progress observers after every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

/// End-of-batch summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatchSummary {
    pub total: usize,
    /// Results written to the store, failures included.
    pub persisted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs interrupted by cancellation; these are not stored.
    pub cancelled: usize,
    #[serde(default)]
    pub first_id: Option<RepetitionId>,
    pub elapsed_secs: f64,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        self.cancelled == 0 && self.persisted == self.total
    }
}

/// Stamps, shuffles, and executes batches of combinations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDispatcher {
    seed: Option<u64>,
}

impl RunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the shuffle seed so the execution order is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Stamps `missing[i]` with `first + i`.
    pub fn stamp(first: RepetitionId, missing: &[ParameterCombination]) -> Vec<ParameterCombination> {
        missing
            .iter()
            .enumerate()
            .map(|(idx, combination)| combination.with_repetition(first.offset(idx as u64)))
            .collect()
    }

    /// Runs every combination once, persisting results as they complete.
    pub fn execute<S, R>(
        &self,
        store: &S,
        runner: &R,
        missing: Vec<ParameterCombination>,
    ) -> Result<BatchSummary, SemError>
    where
        S: ResultStore + ?Sized,
        R: ProcessRunner + ?Sized,
    {
        self.execute_with_progress(store, runner, missing, |_| {})
    }

    /// Like [`RunDispatcher::execute`], reporting progress after every result.
    pub fn execute_with_progress<S, R, F>(
        &self,
        store: &S,
        runner: &R,
        missing: Vec<ParameterCombination>,
        mut on_progress: F,
    ) -> Result<BatchSummary, SemError>
    where
        S: ResultStore + ?Sized,
        R: ProcessRunner + ?Sized,
        F: FnMut(&Progress),
    {
        let start = Instant::now();
        let total = missing.len();
        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };
        if total == 0 {
            debug!("nothing to run");
            return Ok(summary);
        }

        // One allocation per batch; workers never touch the counter.
        let first = store.allocate_repetition_ids(total as u64)?;
        summary.first_id = Some(first);
        let mut stamped = Self::stamp(first, &missing);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        stamped.shuffle(&mut rng);

        info!(jobs = total, first_id = %first, "starting simulation batch");
        let data_dir = store.get_data_dir();
        let stream = runner.run_simulations(stamped, &data_dir)?;
        let mut completed = 0;
        for result in stream {
            completed += 1;
            if result.status.is_cancelled() {
                summary.cancelled += 1;
            } else {
                if let Err(err) = store.insert_result(&result) {
                    runner.cancel_token().cancel();
                    return Err(err);
                }
                summary.persisted += 1;
                if result.status.is_failure() {
                    summary.failed += 1;
                } else {
                    summary.succeeded += 1;
                }
            }
            on_progress(&Progress {
                completed,
                total,
                failed: summary.failed,
            });
        }
        summary.elapsed_secs = start.elapsed().as_secs_f64();

        if completed < total {
            return Err(SemError::Runner(
                ErrorInfo::new("sem_exp.dispatch_truncated", "result stream ended early")
                    .with_context("expected", total.to_string())
                    .with_context("received", completed.to_string()),
            ));
        }
        if summary.cancelled > 0 {
            warn!(
                cancelled = summary.cancelled,
                persisted = summary.persisted,
                "batch interrupted; rerun missing simulations to resume"
            );
        }
        if summary.failed > 0 {
            warn!(failed = summary.failed, total, "batch finished with failed simulations");
        }
        info!(
            persisted = summary.persisted,
            elapsed = summary.elapsed_secs,
            "simulation batch finished"
        );
        Ok(summary)
    }
}
