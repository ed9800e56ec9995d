use anyhow::{Context, Result};
use clap::Parser;
use disco_eval::cli::{self, TxtToNpyArgs};
use disco_eval::convert;

fn main() -> Result<()> {
    cli::init_logging();
    let args = TxtToNpyArgs::parse();

    convert::txt_to_npy(&args.in_txt, &args.out_path)
        .with_context(|| format!("converting {}", args.in_txt.display()))?;
    Ok(())
}
