use std::path::PathBuf;

use clap::Parser;

use crate::heatmap::DEFAULT_DPI;

/// Environment variable holding the log filter, e.g. `DISCO_LOG=disco_eval=debug`.
pub const LOG_ENV: &str = "DISCO_LOG";

/// Logs go to stderr; stdout is reserved for the reports.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Parser)]
#[command(
    name = "compute_confusion_matrix",
    version,
    about = "Label each cell of a binary matrix as TP/FP/TN/FN against a ground truth and render the labels as a heatmap"
)]
pub struct ConfusionArgs {
    /// Binary prediction matrix (.npy)
    pub in_binary_matrix: PathBuf,
    /// Binary ground truth matrix (.npy), same shape as the prediction
    pub in_ground_truth: PathBuf,
    /// Output heatmap (.png)
    pub out_png: PathBuf,
    /// Resolution recorded in the PNG
    #[arg(long, env = "DISCO_DPI", default_value_t = DEFAULT_DPI)]
    pub dpi: u32,
    /// Also write the counts and percentages as JSON
    #[arg(long, value_name = "JSON")]
    pub summary: Option<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(
    name = "compute_correlation",
    version,
    about = "DiSCo challenge connectivity evaluation: Pearson r over the lower triangle of two 16x16 matrices"
)]
pub struct CorrelationArgs {
    /// Ground truth connectivity matrix (text)
    #[arg(value_name = "GT")]
    pub ground_truth: PathBuf,
    /// Estimated connectivity matrix (text)
    #[arg(value_name = "MATRIX")]
    pub matrix: PathBuf,
}

#[derive(Debug, Parser)]
#[command(name = "convert_npy2txt", version, about = "Convert a .npy array to a text matrix")]
pub struct NpyToTxtArgs {
    pub in_npy: PathBuf,
    /// Output directory, receives <stem>.txt
    pub out_path: PathBuf,
}

#[derive(Debug, Parser)]
#[command(name = "convert_txt2npy", version, about = "Convert a text matrix to a .npy array")]
pub struct TxtToNpyArgs {
    pub in_txt: PathBuf,
    /// Output directory, receives <stem>.npy
    pub out_path: PathBuf,
}
