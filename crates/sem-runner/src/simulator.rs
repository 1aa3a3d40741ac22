//! Invocation of one external simulation.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use sem_core::{
    CancelFlag, ErrorInfo, ParameterCombination, RunMeta, RunStatus, SemError, SimulationResult,
    REPETITION_KEY,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::hash::run_id;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const HELP_FLAG: &str = "--PrintHelp";
const GENERAL_SECTION: &str = "General Arguments";

/// Per-job resource limits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JobLimits {
    /// Wall-clock limit after which the process is killed.
    pub timeout: Option<Duration>,
}

impl JobLimits {
    /// Limits from a timeout in seconds. `None` and zero mean no limit;
    /// negative, NaN, infinite or out-of-range values are rejected.
    pub fn with_timeout_secs(secs: Option<f64>) -> Result<Self, SemError> {
        let timeout = match secs {
            None => None,
            Some(secs) if secs == 0.0 => None,
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|err| {
                SemError::Config(
                    ErrorInfo::new("sem_runner.timeout", "invalid job timeout")
                        .with_context("timeout_secs", secs.to_string())
                        .with_hint(err.to_string()),
                )
            })?),
        };
        Ok(Self { timeout })
    }
}

/// Location of a simulation program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulator {
    path: PathBuf,
    script: String,
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
    WaitFailed(String),
}

impl Simulator {
    pub fn new(path: impl Into<PathBuf>, script: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            script: script.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Program to execute: the script resolved against the installation path.
    pub fn executable(&self) -> PathBuf {
        let script = Path::new(&self.script);
        if script.is_absolute() {
            script.to_path_buf()
        } else {
            self.path.join(script)
        }
    }

    /// Command-line arguments for a combination, one `--name=value` each.
    pub fn arguments(params: &ParameterCombination) -> Vec<String> {
        params
            .iter()
            .map(|(name, value)| format!("--{}={}", name, render_value(value)))
            .collect()
    }

    /// Asks the program for its accepted parameters via `--PrintHelp`.
    pub fn available_parameters(&self) -> Result<BTreeSet<String>, SemError> {
        let exe = self.executable();
        let output = Command::new(&exe)
            .arg(HELP_FLAG)
            .current_dir(&self.path)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                SemError::Runner(
                    ErrorInfo::new("sem_runner.introspect", "failed to query simulator parameters")
                        .with_context("program", exe.display().to_string())
                        .with_hint(err.to_string()),
                )
            })?;
        let mut params = parse_help(&String::from_utf8_lossy(&output.stdout));
        if params.is_empty() && !output.status.success() {
            return Err(SemError::Runner(
                ErrorInfo::new("sem_runner.introspect", "simulator rejected --PrintHelp")
                    .with_context("program", exe.display().to_string())
                    .with_context("status", output.status.to_string()),
            ));
        }
        params.insert(REPETITION_KEY.to_string());
        Ok(params)
    }

    /// Runs one combination to completion inside `output_dir/<run id>`.
    ///
    /// Never fails: every abnormal outcome is recorded in the returned status.
    pub fn execute(
        &self,
        params: &ParameterCombination,
        output_dir: &Path,
        limits: &JobLimits,
        cancel: &CancelFlag,
    ) -> SimulationResult {
        let id = run_id(params);
        let started_at = Utc::now().to_rfc3339();
        let start = Instant::now();
        let job_dir = output_dir.join(&id);
        let stdout_path = job_dir.join("stdout");
        let stderr_path = job_dir.join("stderr");
        let mut meta = RunMeta {
            id,
            started_at,
            elapsed_secs: 0.0,
            exit_code: None,
            output_dir: Some(job_dir.clone()),
            stdout_file: Some(stdout_path.clone()),
            stderr_file: Some(stderr_path.clone()),
        };
        if cancel.is_cancelled() {
            meta.output_dir = None;
            meta.stdout_file = None;
            meta.stderr_file = None;
            return record(params, meta, RunStatus::Cancelled, String::new(), String::new());
        }

        let mut child = match self.spawn(params, &job_dir, &stdout_path, &stderr_path) {
            Ok(child) => child,
            Err(reason) => {
                warn!(run = %meta.id, %reason, "simulation failed to start");
                meta.elapsed_secs = start.elapsed().as_secs_f64();
                let status = RunStatus::SpawnFailed { reason };
                return record(params, meta, status, String::new(), String::new());
            }
        };
        debug!(run = %meta.id, pid = child.id(), "simulation started");

        let outcome = wait(&mut child, start, limits, cancel);
        meta.elapsed_secs = start.elapsed().as_secs_f64();
        let stdout = read_lossy(&stdout_path);
        let mut stderr = read_lossy(&stderr_path);
        let status = match outcome {
            Outcome::Exited(exit) => {
                meta.exit_code = exit.code();
                if exit.success() {
                    RunStatus::Success
                } else if cancel.is_cancelled() {
                    // An interrupt delivered to the whole process group kills
                    // the child before the poll loop sees the flag.
                    RunStatus::Cancelled
                } else {
                    RunStatus::Failed {
                        exit_code: exit.code(),
                    }
                }
            }
            Outcome::TimedOut(limit) => RunStatus::TimedOut {
                limit_secs: limit.as_secs_f64(),
            },
            Outcome::Cancelled => RunStatus::Cancelled,
            Outcome::WaitFailed(reason) => {
                stderr.push_str(&reason);
                RunStatus::Failed { exit_code: None }
            }
        };
        if status == RunStatus::Cancelled {
            discard_job_dir(&job_dir);
            meta.output_dir = None;
            meta.stdout_file = None;
            meta.stderr_file = None;
            debug!(run = %meta.id, "simulation cancelled");
            return record(params, meta, status, stdout, stderr);
        }
        if status.is_failure() {
            warn!(run = %meta.id, status = status.label(), "simulation failed");
        } else {
            debug!(run = %meta.id, elapsed = meta.elapsed_secs, "simulation finished");
        }
        record(params, meta, status, stdout, stderr)
    }

    fn spawn(
        &self,
        params: &ParameterCombination,
        job_dir: &Path,
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> Result<Child, String> {
        fs::create_dir_all(job_dir)
            .map_err(|err| format!("failed to create {}: {err}", job_dir.display()))?;
        let stdout = File::create(stdout_path)
            .map_err(|err| format!("failed to create {}: {err}", stdout_path.display()))?;
        let stderr = File::create(stderr_path)
            .map_err(|err| format!("failed to create {}: {err}", stderr_path.display()))?;
        let exe = self.executable();
        Command::new(&exe)
            .args(Self::arguments(params))
            .current_dir(job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|err| format!("failed to spawn {}: {err}", exe.display()))
    }
}

fn wait(child: &mut Child, start: Instant, limits: &JobLimits, cancel: &CancelFlag) -> Outcome {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Outcome::Exited(status),
            Ok(None) => {}
            Err(err) => {
                terminate(child);
                return Outcome::WaitFailed(format!("failed to wait for simulation: {err}"));
            }
        }
        if cancel.is_cancelled() {
            terminate(child);
            return Outcome::Cancelled;
        }
        if let Some(limit) = limits.timeout {
            if start.elapsed() >= limit {
                terminate(child);
                return Outcome::TimedOut(limit);
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(pid = child.id(), %err, "kill failed, process likely exited");
    }
    let _ = child.wait();
}

fn discard_job_dir(job_dir: &Path) {
    if let Err(err) = fs::remove_dir_all(job_dir) {
        debug!(dir = %job_dir.display(), %err, "failed to remove cancelled job directory");
    }
}

fn record(
    params: &ParameterCombination,
    meta: RunMeta,
    status: RunStatus,
    stdout: String,
    stderr: String,
) -> SimulationResult {
    SimulationResult {
        params: params.clone(),
        stdout,
        stderr,
        status,
        meta,
    }
}

fn read_lossy(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Extracts `--name:` entries from `--PrintHelp` output, skipping the
/// general-arguments section every program shares.
pub fn parse_help(text: &str) -> BTreeSet<String> {
    let mut params = BTreeSet::new();
    let mut in_general = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("--") {
            if in_general {
                continue;
            }
            if let Some((name, _)) = rest.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    params.insert(name.to_string());
                }
            }
        } else if let Some(header) = trimmed.strip_suffix(':') {
            in_general = header == GENERAL_SECTION;
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELP: &str = "wifi-example [Program Options] [General Arguments]\n\n\
Program Options:\n    --nWifi:     Number of wifi STA devices [3]\n    --distance:  Distance [10]\n\n\
General Arguments:\n    --PrintGlobals:  Print the list of globals.\n    --PrintHelp:     Print this help message.\n";

    #[test]
    fn help_parsing_skips_general_arguments() {
        let params = parse_help(HELP);
        let names: Vec<_> = params.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["distance", "nWifi"]);
    }

    #[test]
    fn arguments_render_strings_unquoted() {
        let params = ParameterCombination::new()
            .with("mode", "fast")
            .with("n", 3)
            .with("ratio", 0.5);
        assert_eq!(
            Simulator::arguments(&params),
            vec!["--mode=fast", "--n=3", "--ratio=0.5"]
        );
    }

    #[test]
    fn executable_resolves_against_path() {
        let sim = Simulator::new("/opt/ns-3", "build/wifi");
        assert_eq!(sim.executable(), PathBuf::from("/opt/ns-3/build/wifi"));
        let abs = Simulator::new("/opt/ns-3", "/usr/bin/true");
        assert_eq!(abs.executable(), PathBuf::from("/usr/bin/true"));
    }

    #[test]
    fn zero_timeout_means_unlimited() {
        let limits = JobLimits::with_timeout_secs(Some(0.0)).expect("zero");
        assert_eq!(limits.timeout, None);
        let limits = JobLimits::with_timeout_secs(None).expect("none");
        assert_eq!(limits.timeout, None);
        let limits = JobLimits::with_timeout_secs(Some(1.5)).expect("finite");
        assert_eq!(limits.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn unrepresentable_timeouts_are_config_errors() {
        for secs in [f64::INFINITY, f64::NAN, -1.0, 1e30] {
            let err = JobLimits::with_timeout_secs(Some(secs)).expect_err("rejected");
            assert!(matches!(err, SemError::Config(_)), "{secs}: {err:?}");
            assert_eq!(err.info().code, "sem_runner.timeout");
        }
    }
}
