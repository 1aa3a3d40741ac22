use std::error::Error;

use clap::{Args as ClapArgs, Parser, Subcommand};
use commands::{
    export::{self, ExportArgs},
    info::{self, InfoArgs},
    new::{self, NewArgs},
    run::{self, RunArgs},
    view::{self, ViewArgs},
};
use sem_runner::RunnerConfig;
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_FILTER: &str = "warn,sem_core=info,sem_db=info,sem_runner=info,sem_exp=info,sem=info";

#[derive(Parser, Debug)]
#[command(name = "sem", about = "Simulation campaign manager")]
struct Cli {
    #[command(flatten)]
    runner: RunnerOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a campaign for a simulation script.
    New(NewArgs),
    /// Print a summary of an existing campaign.
    Info(InfoArgs),
    /// Top a parameter space up to the requested repetitions.
    Run(RunArgs),
    /// Print stored results over a parameter space as a labelled array.
    View(ViewArgs),
    /// Write every stored result to a JSON or CSV file.
    Export(ExportArgs),
}

/// Execution options shared by every subcommand that drives simulations.
#[derive(ClapArgs, Debug, Clone)]
pub struct RunnerOpts {
    /// Execution mode: SimulationRunner or ParallelRunner.
    #[arg(long, global = true, default_value = "ParallelRunner")]
    pub runner: String,
    /// Worker threads for the parallel runner; 0 uses one per CPU.
    #[arg(long, global = true, default_value_t = 0)]
    pub workers: usize,
    /// Per-simulation wall-clock limit in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<f64>,
    /// Seed for the execution order shuffle.
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

impl RunnerOpts {
    pub fn config(&self) -> Result<RunnerConfig, Box<dyn Error>> {
        let config = RunnerConfig::from_name(&self.runner, self.workers)
            .map_err(|err| Box::new(err) as Box<dyn Error>)?;
        Ok(config.with_timeout_secs(self.timeout))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::New(args) => new::run(&args, &cli.runner),
        Command::Info(args) => info::run(&args),
        Command::Run(args) => run::run(&args, &cli.runner),
        Command::View(args) => view::run(&args),
        Command::Export(args) => export::run(&args),
    }
}
