use sem_core::ParameterCombination;
use sha2::{Digest, Sha256};

/// Stable identifier of a run, derived from its full parameter set.
///
/// Parameters are unique per stored result (repetition id included), so the
/// identifier doubles as a collision-free working directory name.
pub fn run_id(params: &ParameterCombination) -> String {
    let canonical = params.to_canonical_json().unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}
