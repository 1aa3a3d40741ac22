//! Contracts between the engine and its storage and execution collaborators.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::CampaignConfig;
use crate::errors::SemError;
use crate::params::{ParameterCombination, Query, RepetitionId};
use crate::result::SimulationResult;

/// Durable keyed storage of simulation results.
///
/// Implementations must allow concurrent inserts from several threads.
pub trait ResultStore: Send + Sync {
    /// Returns the identifier the next allocation would hand out.
    fn next_repetition_id(&self) -> Result<RepetitionId, SemError>;

    /// Atomically reserves `count` consecutive identifiers and returns the first.
    ///
    /// Reserved identifiers are never handed out again, even when unused.
    fn allocate_repetition_ids(&self, count: u64) -> Result<RepetitionId, SemError>;

    /// Persists a result. Fails with [`SemError::DuplicateKey`] when a result
    /// with the same parameters, repetition id included, already exists.
    fn insert_result(&self, result: &SimulationResult) -> Result<(), SemError>;

    /// Returns every result matching the partial query, in no particular order.
    fn query(&self, query: &Query) -> Result<Vec<SimulationResult>, SemError>;

    /// Campaign configuration the store was created with.
    fn config(&self) -> &CampaignConfig;

    /// Number of results matching the query.
    fn count(&self, query: &Query) -> Result<usize, SemError> {
        Ok(self.query(query)?.len())
    }

    fn get_data_dir(&self) -> PathBuf {
        self.config().data_dir()
    }

    fn get_path(&self) -> &Path {
        self.config().path()
    }

    fn get_script(&self) -> &str {
        self.config().script()
    }
}

/// Knows how to invoke the simulator for a list of combinations.
pub trait ProcessRunner: Send + Sync {
    /// Parameter names the simulator accepts.
    fn available_parameters(&self) -> Result<BTreeSet<String>, SemError>;

    /// Starts executing `params` and returns a stream yielding exactly one
    /// result per input, in completion order.
    fn run_simulations<'a>(
        &'a self,
        params: Vec<ParameterCombination>,
        output_dir: &Path,
    ) -> Result<ResultStream<'a>, SemError>;

    /// Token that interrupts batches started by this runner.
    fn cancel_token(&self) -> CancelToken;
}

/// Lazy, push-as-completed sequence of results.
pub struct ResultStream<'a> {
    inner: Box<dyn Iterator<Item = SimulationResult> + 'a>,
    total: usize,
    yielded: usize,
}

impl<'a> ResultStream<'a> {
    /// Wraps an iterator that produces `total` results.
    pub fn new(total: usize, inner: impl Iterator<Item = SimulationResult> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            total,
            yielded: 0,
        }
    }

    /// Number of results the stream will produce in total.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for ResultStream<'_> {
    type Item = SimulationResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.total {
            return None;
        }
        let next = self.inner.next()?;
        self.yielded += 1;
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.yielded;
        (0, Some(remaining))
    }
}

impl fmt::Debug for ResultStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("total", &self.total)
            .field("yielded", &self.yielded)
            .finish()
    }
}

/// Cancellation flag owned by exactly one batch.
///
/// Jobs check it before starting and while waiting on their process.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Controller handle for a runner: cancels whichever batch is current.
///
/// Every batch gets a fresh [`CancelFlag`] from [`CancelToken::begin_batch`],
/// so stragglers of an abandoned batch can never cancel the next one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<Mutex<CancelFlag>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> CancelFlag {
        match self.0.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Cancels the batch currently running, if any.
    pub fn cancel(&self) {
        self.current().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.current().is_cancelled()
    }

    /// Installs and returns the flag for a new batch.
    pub fn begin_batch(&self) -> CancelFlag {
        let flag = CancelFlag::new();
        match self.0.lock() {
            Ok(mut slot) => *slot = flag.clone(),
            Err(poisoned) => *poisoned.into_inner() = flag.clone(),
        }
        flag
    }
}
