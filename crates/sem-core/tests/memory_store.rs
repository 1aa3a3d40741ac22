use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use sem_core::{
    CampaignConfig, MemoryStore, ParameterCombination, Query, RepetitionId, ResultStore, RunMeta,
    RunStatus, SimulationResult,
};

fn store() -> MemoryStore {
    MemoryStore::new(CampaignConfig::new(
        "sim",
        "/opt/sim",
        BTreeSet::new(),
        "abc123",
        "/tmp/campaign",
    ))
}

fn result(x: i64, rng_run: u64) -> SimulationResult {
    SimulationResult {
        params: ParameterCombination::new()
            .with("x", x)
            .with_repetition(RepetitionId::from_raw(rng_run)),
        stdout: format!("{x}\n"),
        stderr: String::new(),
        status: RunStatus::Success,
        meta: RunMeta {
            id: format!("run-{x}-{rng_run}"),
            started_at: "1970-01-01T00:00:00Z".into(),
            elapsed_secs: 0.0,
            exit_code: Some(0),
            output_dir: None,
            stdout_file: None,
            stderr_file: None,
        },
    }
}

#[test]
fn allocation_is_monotonic_and_skips_stored_ids() {
    let store = store();
    assert_eq!(store.allocate_repetition_ids(3).expect("alloc").as_raw(), 0);
    assert_eq!(store.next_repetition_id().expect("peek").as_raw(), 3);
    store.insert_result(&result(1, 10)).expect("insert");
    assert_eq!(store.allocate_repetition_ids(1).expect("alloc").as_raw(), 11);
}

#[test]
fn duplicate_insert_is_rejected() {
    let store = store();
    store.insert_result(&result(1, 0)).expect("insert");
    let err = store.insert_result(&result(1, 0)).expect_err("duplicate");
    assert!(err.is_duplicate_key());
    store.insert_result(&result(1, 1)).expect("other repetition");
    assert_eq!(store.count(&Query::all().bind("x", 1)).expect("count"), 2);
}

#[test]
fn integral_float_duplicates_are_rejected() {
    let store = store();
    store.insert_result(&result(1, 5)).expect("insert");
    let mut as_float = result(1, 5);
    as_float.params = ParameterCombination::new()
        .with("x", 1.0)
        .with_repetition(RepetitionId::from_raw(5));
    let err = store.insert_result(&as_float).expect_err("same point");
    assert!(err.is_duplicate_key());
    assert_eq!(store.count(&Query::all()).expect("count"), 1);
}

#[test]
fn concurrent_inserts_are_all_kept() {
    let store = Arc::new(store());
    let first = store.allocate_repetition_ids(40).expect("alloc").as_raw();
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for idx in 0..10 {
                    let id = first + worker * 10 + idx;
                    store.insert_result(&result(worker as i64, id)).expect("insert");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }
    assert_eq!(store.count(&Query::all()).expect("count"), 40);
    assert_eq!(store.next_repetition_id().expect("peek").as_raw(), 40);
}
