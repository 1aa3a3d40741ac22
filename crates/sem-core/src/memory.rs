//! In-memory result store, used for tests and throwaway campaigns.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::config::CampaignConfig;
use crate::errors::{ErrorInfo, SemError};
use crate::params::{Query, RepetitionId};
use crate::result::SimulationResult;
use crate::traits::ResultStore;

#[derive(Debug, Default)]
struct MemoryInner {
    results: Vec<SimulationResult>,
    keys: BTreeSet<String>,
    next_id: u64,
}

/// Volatile [`ResultStore`] guarded by a single mutex.
#[derive(Debug)]
pub struct MemoryStore {
    config: CampaignConfig,
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new(config: CampaignConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, SemError> {
        self.inner.lock().map_err(|_| {
            SemError::Query(ErrorInfo::new(
                "sem_core.memory_poisoned",
                "memory store lock poisoned by a panicking writer",
            ))
        })
    }
}

impl ResultStore for MemoryStore {
    fn next_repetition_id(&self) -> Result<RepetitionId, SemError> {
        Ok(RepetitionId::from_raw(self.lock()?.next_id))
    }

    fn allocate_repetition_ids(&self, count: u64) -> Result<RepetitionId, SemError> {
        let mut inner = self.lock()?;
        let first = inner.next_id;
        inner.next_id += count;
        Ok(RepetitionId::from_raw(first))
    }

    fn insert_result(&self, result: &SimulationResult) -> Result<(), SemError> {
        let rng_run = result.rng_run().ok_or_else(|| {
            SemError::Store(
                ErrorInfo::new("sem_core.memory_insert", "result carries no repetition id")
                    .with_context("id", result.meta.id.clone()),
            )
        })?;
        let key = result.params.normalized_key()?;
        let mut inner = self.lock()?;
        if !inner.keys.insert(key.clone()) {
            return Err(SemError::DuplicateKey(
                ErrorInfo::new("sem_core.memory_duplicate", "result already stored")
                    .with_context("params", key),
            ));
        }
        inner.next_id = inner.next_id.max(rng_run.as_raw() + 1);
        inner.results.push(result.clone());
        debug!(id = %result.meta.id, rng_run = %rng_run, "stored result in memory");
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Vec<SimulationResult>, SemError> {
        let inner = self.lock()?;
        Ok(inner
            .results
            .iter()
            .filter(|result| query.matches(&result.params))
            .cloned()
            .collect())
    }

    fn config(&self) -> &CampaignConfig {
        &self.config
    }
}
