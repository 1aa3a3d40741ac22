use std::error::Error;
use std::fs;
use std::path::Path;

use sem_core::ParameterSpace;
use sem_exp::{Campaign, RunDispatcher};
use sem_runner::RunnerConfig;

use crate::RunnerOpts;

pub mod export;
pub mod info;
pub mod new;
pub mod run;
pub mod view;

/// Reads a YAML list of `{name, values}` axes.
pub fn load_space(path: &Path) -> Result<ParameterSpace, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let space: ParameterSpace = serde_yaml::from_str(&text)?;
    space.validate().map_err(|err| Box::new(err) as Box<dyn Error>)?;
    Ok(space)
}

/// Opens a campaign for reading only; the runner is never started.
pub fn open_campaign(dir: &Path) -> Result<Campaign, Box<dyn Error>> {
    Campaign::load(dir, &RunnerConfig::sequential()).map_err(|err| Box::new(err) as Box<dyn Error>)
}

pub fn with_seed(campaign: Campaign, opts: &RunnerOpts) -> Campaign {
    match opts.seed {
        Some(seed) => campaign.with_dispatcher(RunDispatcher::with_seed(seed)),
        None => campaign,
    }
}
