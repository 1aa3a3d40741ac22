use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use sem_exp::Campaign;
use tracing::{info, warn};

use super::{load_space, with_seed};
use crate::RunnerOpts;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Campaign directory.
    #[arg(long)]
    pub dir: PathBuf,
    /// YAML parameter space.
    #[arg(long)]
    pub space: PathBuf,
    /// Repetitions required for every parameter point.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,
}

pub fn run(args: &RunArgs, opts: &RunnerOpts) -> Result<(), Box<dyn Error>> {
    let space = load_space(&args.space)?;
    let campaign = Campaign::load(&args.dir, &opts.config()?).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    let campaign = with_seed(campaign, opts);
    cancel_on_interrupt(&campaign);
    let desired = sem_exp::expand_space(&space);
    let summary = campaign
        .run_missing_simulations_with_progress(&desired, args.runs, |progress| {
            let step = (progress.total / 10).max(1);
            if progress.completed % step == 0 || progress.completed == progress.total {
                info!(
                    completed = progress.completed,
                    total = progress.total,
                    failed = progress.failed,
                    "progress"
                );
            }
        })
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.cancelled > 0 {
        return Err(format!("run interrupted, {} simulations cancelled", summary.cancelled).into());
    }
    Ok(())
}

/// SIGINT, SIGTERM and SIGHUP cancel the batch in flight; the dispatcher then
/// drains the cancelled jobs and reports what was stored.
fn cancel_on_interrupt(campaign: &Campaign) {
    let token = campaign.cancel_token();
    let installed = ctrlc::set_handler(move || {
        warn!("interrupt received, cancelling running simulations");
        token.cancel();
    });
    if let Err(err) = installed {
        warn!(%err, "failed to install interrupt handler");
    }
}
