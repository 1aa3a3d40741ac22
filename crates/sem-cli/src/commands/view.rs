use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use super::{load_space, open_campaign};

#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Campaign directory.
    #[arg(long)]
    pub dir: PathBuf,
    /// YAML parameter space to reconstruct.
    #[arg(long)]
    pub space: PathBuf,
    /// Average repetitions instead of listing each run.
    #[arg(long)]
    pub average: bool,
}

/// Stdout of one run as a number; unparsable output becomes null.
fn parse_output(stdout: &str) -> Option<f64> {
    stdout.trim().parse().ok()
}

fn mean(values: Vec<Option<f64>>) -> Option<f64> {
    let parsed: Vec<f64> = values.into_iter().flatten().collect();
    if parsed.is_empty() {
        None
    } else {
        Some(parsed.iter().sum::<f64>() / parsed.len() as f64)
    }
}

pub fn run(args: &ViewArgs) -> Result<(), Box<dyn Error>> {
    let space = load_space(&args.space)?;
    let campaign = open_campaign(&args.dir)?;
    let rendered = if args.average {
        let array = campaign
            .results_array_reduced(&space, parse_output, mean)
            .map_err(|err| Box::new(err) as Box<dyn Error>)?;
        serde_json::to_string_pretty(&array)?
    } else {
        let array = campaign
            .results_array(&space, parse_output)
            .map_err(|err| Box::new(err) as Box<dyn Error>)?;
        serde_json::to_string_pretty(&array)?
    };
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_ignores_unparsable_runs() {
        assert_eq!(mean(vec![Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean(vec![None]), None);
        assert_eq!(parse_output(" 4.5\n"), Some(4.5));
    }
}
