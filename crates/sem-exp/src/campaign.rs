//! Campaign facade tying a result store to a simulation runner.

use std::fmt;
use std::path::Path;

use sem_core::{
    CampaignConfig, CancelToken, ErrorInfo, ParameterCombination, ParameterSpace, ProcessRunner,
    Query, ResultStore, SemError,
};
use sem_db::{SqliteStore, DB_FILE_NAME};
use sem_runner::{build_runner, RunnerConfig, Simulator};
use tracing::info;

use crate::array::LabeledArray;
use crate::dedup::missing_simulations;
use crate::dispatch::{BatchSummary, Progress, RunDispatcher};
use crate::grid::expand_space;
use crate::provenance::source_fingerprint;
use crate::space::{Nested, SpaceReconstructor};

/// A simulation campaign: one simulator, one store, many results.
pub struct Campaign {
    store: Box<dyn ResultStore>,
    runner: Box<dyn ProcessRunner>,
    dispatcher: RunDispatcher,
}

impl Campaign {
    /// Assembles a campaign from already constructed collaborators.
    pub fn from_parts(store: Box<dyn ResultStore>, runner: Box<dyn ProcessRunner>) -> Self {
        Self {
            store,
            runner,
            dispatcher: RunDispatcher::new(),
        }
    }

    /// Creates a fresh campaign in `campaign_dir` for `script` under `path`.
    ///
    /// The runner is built first so an unknown execution mode fails before
    /// anything touches the disk.
    pub fn new(
        path: impl AsRef<Path>,
        script: &str,
        campaign_dir: impl AsRef<Path>,
        runner_config: &RunnerConfig,
    ) -> Result<Self, SemError> {
        let path = path.as_ref();
        let campaign_dir = campaign_dir.as_ref();
        let runner = build_runner(runner_config, Simulator::new(path, script))?;
        let db_path = campaign_dir.join(DB_FILE_NAME);
        if db_path.exists() {
            return Err(SemError::Config(
                ErrorInfo::new("sem_exp.campaign_exists", "campaign already exists")
                    .with_context("path", db_path.display().to_string())
                    .with_hint("use load to reopen an existing campaign"),
            ));
        }
        let params = runner.available_parameters()?;
        let commit = source_fingerprint(path);
        let config = CampaignConfig::new(script, path, params, commit, campaign_dir);
        let store = SqliteStore::create(config)?;
        info!(
            dir = %campaign_dir.display(),
            script,
            runner = %runner_config.kind,
            "campaign created"
        );
        Ok(Self::from_parts(Box::new(store), runner))
    }

    /// Reopens the campaign stored in `campaign_dir`.
    pub fn load(campaign_dir: impl AsRef<Path>, runner_config: &RunnerConfig) -> Result<Self, SemError> {
        let store = SqliteStore::open(campaign_dir.as_ref())?;
        let simulator = Simulator::new(store.config().path.clone(), store.config().script.clone());
        let runner = build_runner(runner_config, simulator)?;
        info!(db = %store.path().display(), runner = %runner_config.kind, "campaign loaded");
        Ok(Self::from_parts(Box::new(store), runner))
    }

    pub fn with_dispatcher(mut self, dispatcher: RunDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn store(&self) -> &dyn ResultStore {
        self.store.as_ref()
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn config(&self) -> &CampaignConfig {
        self.store.config()
    }

    /// Token that interrupts the batch currently running.
    pub fn cancel_token(&self) -> CancelToken {
        self.runner.cancel_token()
    }

    /// Total number of stored results.
    pub fn result_count(&self) -> Result<usize, SemError> {
        self.store.count(&Query::all())
    }

    /// Rejects combinations naming parameters the simulator does not accept.
    pub fn check_parameters(&self, combinations: &[ParameterCombination]) -> Result<(), SemError> {
        let available = &self.config().params;
        if available.is_empty() {
            return Ok(());
        }
        for combination in combinations {
            let unknown = combination.unknown_names(available);
            if !unknown.is_empty() {
                return Err(SemError::Config(
                    ErrorInfo::new("sem_exp.unknown_parameter", "simulator does not accept parameter")
                        .with_context("unknown", unknown.join(","))
                        .with_context("script", self.config().script.clone()),
                ));
            }
        }
        Ok(())
    }

    /// Runs every combination once.
    pub fn run_simulations(&self, combinations: Vec<ParameterCombination>) -> Result<BatchSummary, SemError> {
        self.run_simulations_with_progress(combinations, |_| {})
    }

    pub fn run_simulations_with_progress<F>(
        &self,
        combinations: Vec<ParameterCombination>,
        on_progress: F,
    ) -> Result<BatchSummary, SemError>
    where
        F: FnMut(&Progress),
    {
        self.check_parameters(&combinations)?;
        self.dispatcher.execute_with_progress(
            self.store.as_ref(),
            self.runner.as_ref(),
            combinations,
            on_progress,
        )
    }

    pub fn missing_simulations(
        &self,
        desired: &[ParameterCombination],
        runs: usize,
    ) -> Result<Vec<ParameterCombination>, SemError> {
        missing_simulations(self.store.as_ref(), desired, runs)
    }

    /// Tops every combination up to `runs` stored repetitions.
    pub fn run_missing_simulations(
        &self,
        desired: &[ParameterCombination],
        runs: usize,
    ) -> Result<BatchSummary, SemError> {
        self.run_missing_simulations_with_progress(desired, runs, |_| {})
    }

    pub fn run_missing_simulations_with_progress<F>(
        &self,
        desired: &[ParameterCombination],
        runs: usize,
        on_progress: F,
    ) -> Result<BatchSummary, SemError>
    where
        F: FnMut(&Progress),
    {
        self.check_parameters(desired)?;
        let missing = self.missing_simulations(desired, runs)?;
        info!(desired = desired.len(), runs, missing = missing.len(), "computed missing simulations");
        self.run_simulations_with_progress(missing, on_progress)
    }

    /// Expands `space` and tops every point up to `runs` repetitions.
    pub fn run_missing_space(&self, space: &ParameterSpace, runs: usize) -> Result<BatchSummary, SemError> {
        space.validate()?;
        self.run_missing_simulations(&expand_space(space), runs)
    }

    /// Results over `space`, one nesting level per axis, parsed by `leaf_fn`.
    pub fn results_space<T, F>(&self, space: &ParameterSpace, leaf_fn: F) -> Result<Nested<Vec<T>>, SemError>
    where
        F: FnMut(&str) -> T,
    {
        SpaceReconstructor::new(self.store.as_ref()).build(&Query::all(), space, leaf_fn)
    }

    /// Results over `space` with each point's repetitions reduced to one value.
    pub fn results_space_reduced<T, U, F, R>(
        &self,
        space: &ParameterSpace,
        leaf_fn: F,
        reduce_fn: R,
    ) -> Result<Nested<U>, SemError>
    where
        F: FnMut(&str) -> T,
        R: FnMut(Vec<T>) -> U,
    {
        SpaceReconstructor::new(self.store.as_ref()).build_reduced(&Query::all(), space, leaf_fn, reduce_fn)
    }

    /// Dense labelled array over `space` plus a `runs` dimension, with
    /// length-one dimensions squeezed out.
    pub fn results_array<T, F>(&self, space: &ParameterSpace, leaf_fn: F) -> Result<LabeledArray<T>, SemError>
    where
        F: FnMut(&str) -> T,
    {
        let nested = self.results_space(space, leaf_fn)?;
        Ok(LabeledArray::from_runs(space, nested)?.squeeze())
    }

    pub fn results_array_reduced<T, U, F, R>(
        &self,
        space: &ParameterSpace,
        leaf_fn: F,
        reduce_fn: R,
    ) -> Result<LabeledArray<U>, SemError>
    where
        F: FnMut(&str) -> T,
        R: FnMut(Vec<T>) -> U,
    {
        let nested = self.results_space_reduced(space, leaf_fn, reduce_fn)?;
        Ok(LabeledArray::from_reduced(space, nested)?.squeeze())
    }
}

impl fmt::Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config();
        writeln!(f, "--- Campaign info ---")?;
        writeln!(f, "script: {}", config.script)?;
        writeln!(f, "path: {}", config.path.display())?;
        writeln!(f, "commit: {}", config.commit)?;
        writeln!(f, "created: {}", config.created_at)?;
        let params: Vec<&str> = config.params.iter().map(String::as_str).collect();
        writeln!(f, "parameters: {}", params.join(", "))?;
        match self.result_count() {
            Ok(count) => writeln!(f, "results: {count}")?,
            Err(err) => writeln!(f, "results: unavailable ({})", err.info().code)?,
        }
        write!(f, "---------------------")
    }
}

impl fmt::Debug for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Campaign")
            .field("script", &self.config().script)
            .field("campaign_dir", &self.config().campaign_dir)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
