use std::iter;

use sem_core::{ParameterCombination, Query, ResultStore, SemError};
use tracing::debug;

/// Returns the combinations that still need to run so that every entry of
/// `desired` has at least `runs` stored repetitions.
///
/// Each missing repetition is an independent value; output order follows
/// `desired`. The store is only read.
pub fn missing_simulations<S: ResultStore + ?Sized>(
    store: &S,
    desired: &[ParameterCombination],
    runs: usize,
) -> Result<Vec<ParameterCombination>, SemError> {
    let mut missing = Vec::new();
    for combination in desired {
        let have = store.count(&Query::from(combination))?;
        let needed = runs.saturating_sub(have);
        if needed > 0 {
            debug!(have, needed, "combination below requested repetitions");
        }
        missing.extend(iter::repeat(combination).take(needed).cloned());
    }
    Ok(missing)
}
