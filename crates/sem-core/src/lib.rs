#![doc = "Core data model and contracts for simulation campaigns: parameter combinations, result records, and the store and runner interfaces the engine is built against."]

pub mod config;
pub mod errors;
pub mod memory;
pub mod params;
pub mod result;
pub mod traits;

pub use config::{CampaignConfig, DATA_DIR_NAME};
pub use errors::{serde_error, ErrorInfo, SemError};
pub use memory::MemoryStore;
pub use params::{
    values_match, Axis, ParameterCombination, ParameterSpace, Query, RepetitionId, REPETITION_KEY,
};
pub use result::{RunMeta, RunStatus, SimulationResult};
pub use traits::{CancelFlag, CancelToken, ProcessRunner, ResultStore, ResultStream};
