//! Sequential and worker-pool execution of external simulations.

mod hash;
mod kind;
mod parallel;
mod sequential;
mod simulator;

pub use hash::run_id;
pub use kind::{build_runner, RunnerConfig, RunnerKind};
pub use parallel::ParallelRunner;
pub use sequential::SimulationRunner;
pub use simulator::{parse_help, JobLimits, Simulator};
