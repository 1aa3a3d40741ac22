#![cfg(unix)]

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use sem_core::{ParameterCombination, ProcessRunner, RepetitionId, RunStatus, SemError};
use sem_runner::{build_runner, JobLimits, ParallelRunner, RunnerConfig, SimulationRunner, Simulator};
use tempfile::tempdir;

const SCRIPT: &str = r#"#!/bin/sh
case "$*" in
  *--PrintHelp*)
    printf 'Program Options:\n    --x:     first\n    --mode:  behaviour\n\nGeneral Arguments:\n    --PrintHelp:  help\n'
    exit 0
    ;;
  *--mode=fail*)
    echo "boom" >&2
    exit 3
    ;;
  *--mode=sleep*)
    sleep 5
    ;;
esac
echo "$@"
"#;

/// Writes the fake simulator once per test binary, before any test forks.
fn simulator_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("sem_runner_fake_sim_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("sim dir");
        let script = dir.join("fake-sim");
        fs::write(&script, SCRIPT).expect("write script");
        let mut perms = fs::metadata(&script).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).expect("chmod");
        dir
    })
}

fn simulator() -> Simulator {
    Simulator::new(simulator_dir(), "fake-sim")
}

fn jobs(mode: &str, count: u64) -> Vec<ParameterCombination> {
    (0..count)
        .map(|idx| {
            ParameterCombination::new()
                .with("x", idx)
                .with("mode", mode)
                .with_repetition(RepetitionId::from_raw(100 + idx))
        })
        .collect()
}

#[test]
fn introspection_reports_program_options_and_rng_run() {
    let params = simulator().available_parameters().expect("params");
    let expected: BTreeSet<String> = ["RngRun", "mode", "x"].iter().map(|s| s.to_string()).collect();
    assert_eq!(params, expected);
}

#[test]
fn sequential_runner_captures_output_per_job() {
    let out = tempdir().expect("out");
    let runner = SimulationRunner::new(simulator(), JobLimits::default());
    let stream = runner.run_simulations(jobs("ok", 3), out.path()).expect("stream");
    assert_eq!(stream.total(), 3);
    let results: Vec<_> = stream.collect();
    assert_eq!(results.len(), 3);
    for result in &results {
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.meta.exit_code, Some(0));
        assert!(result.stdout.contains("--mode=ok"));
        assert!(result.stdout.contains(&format!("--RngRun={}", result.rng_run().expect("rng"))));
        let job_dir = result.meta.output_dir.as_ref().expect("dir");
        assert!(job_dir.starts_with(out.path()));
        assert_eq!(fs::read_to_string(job_dir.join("stdout")).expect("stdout"), result.stdout);
    }
    let dirs: BTreeSet<_> = results.iter().map(|r| r.meta.output_dir.clone()).collect();
    assert_eq!(dirs.len(), 3);
}

#[test]
fn failures_are_recorded_not_raised() {
    let out = tempdir().expect("out");
    let runner = SimulationRunner::new(simulator(), JobLimits::default());
    let results: Vec<_> = runner
        .run_simulations(jobs("fail", 2), out.path())
        .expect("stream")
        .collect();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result.status, RunStatus::Failed { exit_code: Some(3) });
        assert!(result.stderr.contains("boom"));
    }
}

#[test]
fn missing_program_is_a_spawn_failure() {
    let out = tempdir().expect("out");
    let runner = SimulationRunner::new(
        Simulator::new(simulator_dir(), "does-not-exist"),
        JobLimits::default(),
    );
    let results: Vec<_> = runner
        .run_simulations(jobs("ok", 1), out.path())
        .expect("stream")
        .collect();
    assert!(matches!(results[0].status, RunStatus::SpawnFailed { .. }));
}

#[test]
fn parallel_runner_yields_one_result_per_job() {
    let out = tempdir().expect("out");
    let runner = ParallelRunner::new(simulator(), 4, JobLimits::default()).expect("pool");
    assert_eq!(runner.workers(), 4);
    let results: Vec<_> = runner
        .run_simulations(jobs("ok", 12), out.path())
        .expect("stream")
        .collect();
    assert_eq!(results.len(), 12);
    let ids: BTreeSet<_> = results
        .iter()
        .map(|r| r.rng_run().expect("rng").as_raw())
        .collect();
    assert_eq!(ids, (100..112).collect::<BTreeSet<u64>>());
    assert!(results.iter().all(|r| r.status.is_success()));
}

#[test]
fn timeouts_kill_the_job() {
    let out = tempdir().expect("out");
    let runner = build_runner(
        &RunnerConfig::parallel(2).with_timeout_secs(Some(0.2)),
        simulator(),
    )
    .expect("runner");
    let results: Vec<_> = runner
        .run_simulations(jobs("sleep", 2), out.path())
        .expect("stream")
        .collect();
    assert_eq!(results.len(), 2);
    for result in results {
        assert!(matches!(result.status, RunStatus::TimedOut { .. }));
        assert!(result.meta.elapsed_secs < 4.0);
    }
}

#[test]
fn cancellation_interrupts_in_flight_and_pending_jobs() {
    let out = tempdir().expect("out");
    let runner = ParallelRunner::new(simulator(), 2, JobLimits::default()).expect("pool");
    let stream = runner
        .run_simulations(jobs("sleep", 6), out.path())
        .expect("stream");
    runner.cancel_token().cancel();
    let results: Vec<_> = stream.collect();
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.status == RunStatus::Cancelled));
    assert!(results.iter().all(|r| r.meta.output_dir.is_none()));
    let leftovers: Vec<_> = fs::read_dir(out.path()).expect("read out").collect();
    assert!(leftovers.is_empty(), "cancelled jobs left {leftovers:?}");
}

#[test]
fn abandoned_batch_does_not_cancel_the_next_one() {
    let out = tempdir().expect("out");
    let runner = ParallelRunner::new(simulator(), 1, JobLimits::default()).expect("pool");
    let mut first = runner
        .run_simulations(jobs("ok", 20), out.path())
        .expect("first batch");
    assert!(first.next().is_some());
    runner.cancel_token().cancel();
    drop(first);

    let results: Vec<_> = runner
        .run_simulations(jobs("ok", 6), out.path())
        .expect("second batch")
        .collect();
    assert_eq!(results.len(), 6);
    assert!(
        results.iter().all(|r| r.status.is_success()),
        "{:?}",
        results.iter().map(|r| r.status.label()).collect::<Vec<_>>()
    );
}

#[test]
fn sequential_batches_get_fresh_cancellation() {
    let out = tempdir().expect("out");
    let runner = SimulationRunner::new(simulator(), JobLimits::default());
    let mut first = runner.run_simulations(jobs("ok", 3), out.path()).expect("first batch");
    runner.cancel_token().cancel();
    assert!(first.all(|r| r.status == RunStatus::Cancelled));

    let results: Vec<_> = runner
        .run_simulations(jobs("ok", 2), out.path())
        .expect("second batch")
        .collect();
    assert!(results.iter().all(|r| r.status.is_success()));
}

#[test]
fn unrepresentable_timeout_is_rejected_when_building() {
    for secs in [f64::INFINITY, -2.0] {
        let err = build_runner(&RunnerConfig::sequential().with_timeout_secs(Some(secs)), simulator())
            .err().expect("invalid timeout");
        assert!(matches!(err, SemError::Config(_)), "{err:?}");
    }
}

#[test]
fn unknown_runner_fails_before_any_work() {
    let err = RunnerConfig::from_name("ClusterRunner", 4).expect_err("unknown");
    assert!(matches!(err, SemError::UnknownRunner(_)));
}
