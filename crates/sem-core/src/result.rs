//! Simulation result records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::params::{ParameterCombination, RepetitionId};

/// Outcome of one external simulation.
///
/// Failures are data: they travel inside the stored record and never abort
/// sibling jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    /// Process exited with status zero.
    Success,
    /// Process exited non-zero or was killed by a signal (no exit code).
    Failed { exit_code: Option<i32> },
    /// Process exceeded its wall-clock limit and was killed.
    TimedOut { limit_secs: f64 },
    /// Process could not be started at all.
    SpawnFailed { reason: String },
    /// Job was interrupted or never started because the batch was cancelled.
    Cancelled,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }

    /// True for outcomes that count as a simulation failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed { .. } | RunStatus::TimedOut { .. } | RunStatus::SpawnFailed { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunStatus::Cancelled)
    }

    /// Short stable label used in exports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed { .. } => "failed",
            RunStatus::TimedOut { .. } => "timed_out",
            RunStatus::SpawnFailed { .. } => "spawn_failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Execution metadata captured alongside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// Unique identifier of the run, also the name of its working directory.
    pub id: String,
    /// RFC 3339 timestamp of process start.
    pub started_at: String,
    pub elapsed_secs: f64,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub stdout_file: Option<PathBuf>,
    #[serde(default)]
    pub stderr_file: Option<PathBuf>,
}

/// One repetition of a combination together with its captured outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Parameters of the run, including the repetition id.
    pub params: ParameterCombination,
    pub stdout: String,
    pub stderr: String,
    pub status: RunStatus,
    pub meta: RunMeta,
}

impl SimulationResult {
    pub fn rng_run(&self) -> Option<RepetitionId> {
        self.params.repetition()
    }
}
