#![cfg(unix)]

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use sem_core::{ParameterCombination, ParameterSpace, Query, ResultStore, SemError};
use sem_exp::Campaign;
use sem_runner::RunnerConfig;
use serde_json::json;
use tempfile::tempdir;

const SCRIPT: &str = r#"#!/bin/sh
x=0
y=0
for arg in "$@"; do
  case "$arg" in
    --PrintHelp)
      printf 'Program Options:\n    --x:  first\n    --y:  second\n\nGeneral Arguments:\n    --PrintHelp:  help\n'
      exit 0
      ;;
    --x=*) x="${arg#--x=}" ;;
    --y=*) y="${arg#--y=}" ;;
  esac
done
echo $((x + y))
"#;

fn simulator_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("sem_exp_sum_sim_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("sim dir");
        let script = dir.join("sum-sim");
        fs::write(&script, SCRIPT).expect("write script");
        let mut perms = fs::metadata(&script).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).expect("chmod");
        dir
    })
}

fn space() -> ParameterSpace {
    ParameterSpace::new()
        .with_axis("x", vec![json!(1), json!(2), json!(3)])
        .with_axis("y", vec![json!(100)])
}

#[test]
fn create_run_reload_and_read_back() {
    let root = tempdir().expect("root");
    let dir = root.path().join("campaign");
    let campaign =
        Campaign::new(simulator_dir(), "sum-sim", &dir, &RunnerConfig::parallel(2)).expect("create");

    let expected: BTreeSet<String> = ["RngRun", "x", "y"].iter().map(|s| s.to_string()).collect();
    assert_eq!(campaign.config().params, expected);
    assert!(!campaign.config().commit.is_empty());
    assert!(dir.join("campaign.db").exists());
    assert!(dir.join("data").is_dir());

    let summary = campaign.run_missing_space(&space(), 2).expect("run");
    assert!(summary.is_complete());
    assert_eq!(summary.persisted, 6);
    drop(campaign);

    let reloaded = Campaign::load(&dir, &RunnerConfig::sequential()).expect("load");
    assert_eq!(reloaded.result_count().expect("count"), 6);
    assert!(reloaded.missing_simulations(&[ParameterCombination::new().with("x", 2).with("y", 100)], 2)
        .expect("missing")
        .is_empty());

    let array = reloaded
        .results_array(&space(), |stdout| stdout.trim().parse::<i64>().unwrap_or(-1))
        .expect("array");
    assert_eq!(array.shape(), &[3, 2]);
    assert_eq!(array.data(), &[101, 101, 102, 102, 103, 103]);

    let stored = reloaded.store().query(&Query::all().bind("x", 3)).expect("query");
    for result in stored {
        let output_dir = result.meta.output_dir.expect("output dir");
        assert!(output_dir.starts_with(dir.join("data")));
        assert_eq!(fs::read_to_string(output_dir.join("stdout")).expect("stdout"), "103\n");
    }
}

#[test]
fn creating_over_an_existing_campaign_fails() {
    let root = tempdir().expect("root");
    let dir = root.path().join("campaign");
    Campaign::new(simulator_dir(), "sum-sim", &dir, &RunnerConfig::sequential()).expect("create");
    let err = Campaign::new(simulator_dir(), "sum-sim", &dir, &RunnerConfig::sequential())
        .expect_err("exists");
    assert!(matches!(err, SemError::Config(_)));
}

#[test]
fn loading_a_missing_campaign_fails() {
    let root = tempdir().expect("root");
    let err = Campaign::load(root.path().join("absent"), &RunnerConfig::sequential())
        .expect_err("missing");
    assert!(matches!(err, SemError::Query(_)));
}

#[test]
fn unknown_parameters_never_reach_the_simulator() {
    let root = tempdir().expect("root");
    let campaign = Campaign::new(
        simulator_dir(),
        "sum-sim",
        root.path().join("campaign"),
        &RunnerConfig::sequential(),
    )
    .expect("create");
    let err = campaign
        .run_missing_simulations(&[ParameterCombination::new().with("z", 1)], 1)
        .expect_err("unknown");
    assert!(matches!(err, SemError::Config(_)));
    assert_eq!(campaign.result_count().expect("count"), 0);
}
