use std::path::{Path, PathBuf};

use tracing::info;

use crate::{npy, txt, Error, Result};

/// `<out_dir>/<input stem>.<extension>`, the stem being the file name without its last extension.
pub fn output_path(input: &Path, out_dir: &Path, extension: &str) -> PathBuf {
    let mut name = input
        .file_stem()
        .unwrap_or(input.as_os_str())
        .to_os_string();
    name.push(".");
    name.push(extension);
    out_dir.join(name)
}

fn check_out_dir(out_dir: &Path) -> Result<()> {
    if !out_dir.is_dir() {
        return Err(Error::FileNotFound(out_dir.to_path_buf()));
    }
    Ok(())
}

/// Converts an `.npy` array to a text matrix in `out_dir`, returning the written path.
pub fn npy_to_txt(input: &Path, out_dir: &Path) -> Result<PathBuf> {
    check_out_dir(out_dir)?;
    let matrix = npy::load(input)?;
    let output = output_path(input, out_dir, "txt");
    txt::save(&output, &matrix)?;
    info!(input = %input.display(), output = %output.display(), shape = ?matrix.dim(), "converted npy to text");
    Ok(output)
}

/// Converts a text matrix to an `.npy` array in `out_dir`, returning the written path.
///
/// A single row or a single column is stored as a 1-D array of shape `(N,)`.
pub fn txt_to_npy(input: &Path, out_dir: &Path) -> Result<PathBuf> {
    check_out_dir(out_dir)?;
    let matrix = txt::load(input)?;
    let output = output_path(input, out_dir, "npy");
    let (rows, cols) = matrix.dim();
    if rows == 1 || cols == 1 {
        let values: Vec<f64> = matrix.iter().copied().collect();
        npy::save_vector(&output, &values)?;
    } else {
        npy::save(&output, &matrix)?;
    }
    info!(input = %input.display(), output = %output.display(), shape = ?matrix.dim(), "converted text to npy");
    Ok(output)
}
