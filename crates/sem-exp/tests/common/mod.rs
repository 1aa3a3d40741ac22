#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use sem_core::{
    CampaignConfig, CancelToken, MemoryStore, ParameterCombination, ProcessRunner, ResultStream,
    RunMeta, RunStatus, SemError, SimulationResult, REPETITION_KEY,
};
use serde_json::Value;

/// In-process runner whose stdout is the sum of the numeric parameters.
#[derive(Default)]
pub struct FakeRunner {
    available: BTreeSet<String>,
    executed: Mutex<Vec<ParameterCombination>>,
    cancel: CancelToken,
    cancel_after: Option<usize>,
    fail_on_x: Option<i64>,
}

impl FakeRunner {
    pub fn new(available: &[&str]) -> Self {
        Self {
            available: available.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Jobs after the first `count` of each batch report cancellation.
    pub fn cancelling_after(mut self, count: usize) -> Self {
        self.cancel_after = Some(count);
        self
    }

    /// Jobs with `x == value` exit non-zero.
    pub fn failing_on_x(mut self, value: i64) -> Self {
        self.fail_on_x = Some(value);
        self
    }

    pub fn executed(&self) -> Vec<ParameterCombination> {
        self.executed.lock().expect("executed lock").clone()
    }

    fn execute(&self, idx: usize, params: ParameterCombination) -> SimulationResult {
        self.executed.lock().expect("executed lock").push(params.clone());
        let status = if self.cancel_after.is_some_and(|limit| idx >= limit) {
            RunStatus::Cancelled
        } else if self.fail_on_x.is_some() && params.get("x").and_then(Value::as_i64) == self.fail_on_x {
            RunStatus::Failed { exit_code: Some(1) }
        } else {
            RunStatus::Success
        };
        let stdout = if status.is_success() {
            format!("{}\n", numeric_sum(&params))
        } else {
            String::new()
        };
        SimulationResult {
            meta: RunMeta {
                id: format!("fake-{idx}"),
                started_at: "1970-01-01T00:00:00Z".into(),
                elapsed_secs: 0.0,
                exit_code: status.is_success().then_some(0),
                output_dir: None,
                stdout_file: None,
                stderr_file: None,
            },
            params,
            stdout,
            stderr: String::new(),
            status,
        }
    }
}

impl ProcessRunner for FakeRunner {
    fn available_parameters(&self) -> Result<BTreeSet<String>, SemError> {
        Ok(self.available.clone())
    }

    fn run_simulations<'a>(
        &'a self,
        params: Vec<ParameterCombination>,
        _output_dir: &Path,
    ) -> Result<ResultStream<'a>, SemError> {
        let total = params.len();
        let iter = params
            .into_iter()
            .enumerate()
            .map(move |(idx, combination)| self.execute(idx, combination));
        Ok(ResultStream::new(total, iter))
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

pub fn numeric_sum(params: &ParameterCombination) -> f64 {
    params
        .iter()
        .filter(|(name, _)| name.as_str() != REPETITION_KEY)
        .filter_map(|(_, value)| value.as_f64())
        .sum()
}

pub fn memory_store(params: &[&str]) -> MemoryStore {
    MemoryStore::new(CampaignConfig::new(
        "fake-sim",
        "/opt/sim",
        params.iter().map(|name| name.to_string()).collect(),
        "abc123",
        "/tmp/sem-campaign",
    ))
}

pub fn parse_f64(stdout: &str) -> f64 {
    stdout.trim().parse().unwrap_or(f64::NAN)
}
