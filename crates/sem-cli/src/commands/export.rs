use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use sem_db::{export_csv, export_json};

use super::open_campaign;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Campaign directory.
    #[arg(long)]
    pub dir: PathBuf,
    /// Output file; a `.csv` extension selects CSV, anything else JSON.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &ExportArgs) -> Result<(), Box<dyn Error>> {
    let campaign = open_campaign(&args.dir)?;
    let is_csv = args
        .out
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let written = if is_csv {
        export_csv(campaign.store(), &args.out)
    } else {
        export_json(campaign.store(), &args.out)
    }
    .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    println!("exported {written} results to {}", args.out.display());
    Ok(())
}
