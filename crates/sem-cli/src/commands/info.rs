use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use super::open_campaign;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Campaign directory.
    #[arg(long)]
    pub dir: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<(), Box<dyn Error>> {
    let campaign = open_campaign(&args.dir)?;
    println!("{campaign}");
    Ok(())
}
