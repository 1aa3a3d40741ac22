use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use sem_exp::Campaign;

use crate::RunnerOpts;

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Simulator installation directory.
    #[arg(long)]
    pub path: PathBuf,
    /// Simulation program, relative to `--path` unless absolute.
    #[arg(long)]
    pub script: String,
    /// Directory that will hold the campaign database and outputs.
    #[arg(long)]
    pub dir: PathBuf,
}

pub fn run(args: &NewArgs, opts: &RunnerOpts) -> Result<(), Box<dyn Error>> {
    let config = opts.config()?;
    let campaign = Campaign::new(&args.path, &args.script, &args.dir, &config)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    println!("{campaign}");
    Ok(())
}
