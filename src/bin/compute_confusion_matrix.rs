use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use disco_eval::cli::{self, ConfusionArgs};
use disco_eval::{heatmap, metrics, npy};

fn main() -> Result<()> {
    cli::init_logging();
    let args = ConfusionArgs::parse();

    let predicted = npy::load(&args.in_binary_matrix)
        .with_context(|| format!("loading {}", args.in_binary_matrix.display()))?;
    let ground_truth = npy::load(&args.in_ground_truth)
        .with_context(|| format!("loading {}", args.in_ground_truth.display()))?;

    let cm = metrics::confusion_matrix(&predicted, &ground_truth)?;
    let summary = cm.summary()?;
    tracing::info!(shape = ?predicted.dim(), counts = ?summary.counts, "classified cells");
    if summary.counts.true_positives + summary.counts.false_negatives == 0 {
        tracing::warn!("ground truth has no positive cell");
    }

    for line in summary.percentages.report_lines() {
        println!("{line}");
    }

    let img = heatmap::render(&cm);
    heatmap::save_png(&img, &args.out_png, args.dpi)
        .with_context(|| format!("writing {}", args.out_png.display()))?;
    tracing::info!(path = %args.out_png.display(), "heatmap written");

    if let Some(path) = &args.summary {
        let mut file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        summary
            .save_to_file(&mut file)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
