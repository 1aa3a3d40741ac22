use std::fmt;
use std::str::FromStr;

use sem_core::{ErrorInfo, ProcessRunner, SemError};
use serde::{Deserialize, Serialize};

use crate::parallel::ParallelRunner;
use crate::sequential::SimulationRunner;
use crate::simulator::{JobLimits, Simulator};

/// Supported execution modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerKind {
    /// One external process at a time.
    #[serde(rename = "SimulationRunner")]
    Sequential,
    /// Fixed-size pool of concurrent workers.
    #[serde(rename = "ParallelRunner")]
    Parallel,
}

impl FromStr for RunnerKind {
    type Err = SemError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "SimulationRunner" | "sequential" => Ok(RunnerKind::Sequential),
            "ParallelRunner" | "parallel" => Ok(RunnerKind::Parallel),
            other => Err(SemError::UnknownRunner(
                ErrorInfo::new("sem_runner.unknown_kind", "unknown runner")
                    .with_context("runner", other)
                    .with_hint("use SimulationRunner or ParallelRunner"),
            )),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerKind::Sequential => write!(f, "SimulationRunner"),
            RunnerKind::Parallel => write!(f, "ParallelRunner"),
        }
    }
}

/// Execution configuration selected by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub kind: RunnerKind,
    /// Worker count for the pool; 0 means one per CPU.
    #[serde(default)]
    pub workers: usize,
    /// Per-job wall-clock limit in seconds.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

impl RunnerConfig {
    pub fn sequential() -> Self {
        Self {
            kind: RunnerKind::Sequential,
            workers: 1,
            timeout_secs: None,
        }
    }

    pub fn parallel(workers: usize) -> Self {
        Self {
            kind: RunnerKind::Parallel,
            workers,
            timeout_secs: None,
        }
    }

    /// Parses a runner name, failing fast on unknown modes.
    pub fn from_name(name: &str, workers: usize) -> Result<Self, SemError> {
        Ok(Self {
            kind: name.parse()?,
            workers,
            timeout_secs: None,
        })
    }

    pub fn with_timeout_secs(mut self, secs: Option<f64>) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Builds the runner described by `config` for `simulator`.
pub fn build_runner(
    config: &RunnerConfig,
    simulator: Simulator,
) -> Result<Box<dyn ProcessRunner>, SemError> {
    let limits = JobLimits::with_timeout_secs(config.timeout_secs)?;
    match config.kind {
        RunnerKind::Sequential => Ok(Box::new(SimulationRunner::new(simulator, limits))),
        RunnerKind::Parallel => Ok(Box::new(ParallelRunner::new(
            simulator,
            config.workers,
            limits,
        )?)),
    }
}
