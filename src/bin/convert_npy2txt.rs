use anyhow::{Context, Result};
use clap::Parser;
use disco_eval::cli::{self, NpyToTxtArgs};
use disco_eval::convert;

fn main() -> Result<()> {
    cli::init_logging();
    let args = NpyToTxtArgs::parse();

    convert::npy_to_txt(&args.in_npy, &args.out_path)
        .with_context(|| format!("converting {}", args.in_npy.display()))?;
    Ok(())
}
