//! Campaign orchestration: deciding what still needs to run, dispatching it,
//! and rebuilding stored results into parameter-indexed structures.

pub mod array;
pub mod campaign;
pub mod dedup;
pub mod dispatch;
pub mod grid;
pub mod provenance;
pub mod space;

pub use array::{LabeledArray, RUNS_DIM};
pub use campaign::Campaign;
pub use dedup::missing_simulations;
pub use dispatch::{BatchSummary, Progress, RunDispatcher};
pub use grid::expand_space;
pub use provenance::{source_fingerprint, UNKNOWN_REVISION};
pub use space::{Nested, SpaceReconstructor};
