//! Whitespace delimited text matrices.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::open_error;
use crate::{Error, Matrix, Result};

const COMMENT: char = '#';

/// Parses one matrix row per line. `#` starts a comment, blank lines are skipped.
pub fn read_txt<R: BufRead>(reader: R) -> Result<Matrix> {
    let mut values = Vec::new();
    let mut cols = None;
    let mut rows = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let data = match line.split_once(COMMENT) {
            Some((data, _)) => data,
            None => line.as_str(),
        };

        let before = values.len();
        for token in data.split_whitespace() {
            let value = token
                .parse::<f64>()
                .map_err(|_| Error::parse(line_no, format!("cannot parse {token:?} as a number")))?;
            values.push(value);
        }

        let found = values.len() - before;
        if found == 0 {
            continue;
        }
        match cols {
            None => cols = Some(found),
            Some(expected) if expected != found => {
                return Err(Error::parse(
                    line_no,
                    format!("expected {expected} columns, found {found}"),
                ));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let Some(cols) = cols else {
        return Err(Error::EmptyInput("text matrix has no data rows".into()));
    };
    Matrix::from_shape_vec((rows, cols), values).map_err(|err| Error::InvalidInput(err.to_string()))
}

/// Writes one line per row, values in `%.18e` notation separated by a space.
pub fn write_txt<W: Write>(mut writer: W, matrix: &Matrix) -> Result<()> {
    for row in matrix.rows() {
        let line = row
            .iter()
            .map(|&v| format_value(v))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Scientific notation with 18 fractional digits and a signed, two digit exponent.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.into();
    }

    let formatted = format!("{value:.18e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return formatted;
    };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

pub fn load(path: &Path) -> Result<Matrix> {
    let file = File::open(path).map_err(|err| open_error(path, err))?;
    let matrix = read_txt(BufReader::new(file))?;
    debug!(path = %path.display(), shape = ?matrix.dim(), "loaded text matrix");
    Ok(matrix)
}

pub fn save(path: &Path, matrix: &Matrix) -> Result<()> {
    let file = File::create(path).map_err(|err| open_error(path, err))?;
    write_txt(BufWriter::new(file), matrix)?;
    debug!(path = %path.display(), shape = ?matrix.dim(), "saved text matrix");
    Ok(())
}
