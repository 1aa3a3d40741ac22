mod common;

use common::memory_store;
use proptest::prelude::*;
use sem_core::{ParameterCombination, RepetitionId, ResultStore, RunMeta, RunStatus, SimulationResult};
use sem_exp::missing_simulations;

fn stored(x: usize, rng_run: u64) -> SimulationResult {
    SimulationResult {
        params: ParameterCombination::new()
            .with("x", x as u64)
            .with_repetition(RepetitionId::from_raw(rng_run)),
        stdout: String::new(),
        stderr: String::new(),
        status: RunStatus::Success,
        meta: RunMeta {
            id: format!("{x}-{rng_run}"),
            started_at: "1970-01-01T00:00:00Z".into(),
            elapsed_secs: 0.0,
            exit_code: Some(0),
            output_dir: None,
            stdout_file: None,
            stderr_file: None,
        },
    }
}

proptest! {
    #[test]
    fn missing_count_matches_shortfall(have in prop::collection::vec(0usize..4, 1..6), runs in 0usize..5) {
        let store = memory_store(&["x"]);
        let mut rng_run = 0;
        for (x, count) in have.iter().enumerate() {
            for _ in 0..*count {
                store.insert_result(&stored(x, rng_run)).expect("insert");
                rng_run += 1;
            }
        }
        let desired: Vec<_> = (0..have.len())
            .map(|x| ParameterCombination::new().with("x", x as u64))
            .collect();
        let missing = missing_simulations(&store, &desired, runs).expect("missing");
        let expected: usize = have.iter().map(|count| runs.saturating_sub(*count)).sum();
        prop_assert_eq!(missing.len(), expected);
        for (x, count) in have.iter().enumerate() {
            let target = ParameterCombination::new().with("x", x as u64);
            let needed = missing.iter().filter(|combo| **combo == target).count();
            prop_assert_eq!(needed, runs.saturating_sub(*count));
        }
    }
}
