use std::collections::BTreeSet;
use std::path::Path;

use sem_core::{CancelToken, ParameterCombination, ProcessRunner, ResultStream, SemError};

use crate::simulator::{JobLimits, Simulator};

/// Runs one simulation at a time on the calling thread.
///
/// Work happens lazily: each call to `next` on the returned stream executes
/// the next combination.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    simulator: Simulator,
    limits: JobLimits,
    cancel: CancelToken,
}

impl SimulationRunner {
    pub fn new(simulator: Simulator, limits: JobLimits) -> Self {
        Self {
            simulator,
            limits,
            cancel: CancelToken::new(),
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}

impl ProcessRunner for SimulationRunner {
    fn available_parameters(&self) -> Result<BTreeSet<String>, SemError> {
        self.simulator.available_parameters()
    }

    fn run_simulations<'a>(
        &'a self,
        params: Vec<ParameterCombination>,
        output_dir: &Path,
    ) -> Result<ResultStream<'a>, SemError> {
        let flag = self.cancel.begin_batch();
        let output_dir = output_dir.to_path_buf();
        let total = params.len();
        let jobs = params.into_iter().map(move |combination| {
            self.simulator
                .execute(&combination, &output_dir, &self.limits, &flag)
        });
        Ok(ResultStream::new(total, jobs))
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
