use anyhow::{Context, Result};
use clap::Parser;
use disco_eval::cli::{self, CorrelationArgs};
use disco_eval::{correlation, txt};

fn main() -> Result<()> {
    cli::init_logging();
    let args = CorrelationArgs::parse();

    let ground_truth = txt::load(&args.ground_truth)
        .with_context(|| format!("loading {}", args.ground_truth.display()))?;
    let estimate =
        txt::load(&args.matrix).with_context(|| format!("loading {}", args.matrix.display()))?;

    let r = correlation::connectivity_correlation(&ground_truth, &estimate)?;
    tracing::info!(r, "correlated connectivity matrices");

    println!("The r coefficient is {r:.6}.");
    Ok(())
}
