//! Reader and writer for NumPy's `.npy` single array format.
//!
//! Only what the evaluation tools exchange is supported: one- and
//! two-dimensional arrays of booleans, integers or floats. Every element is
//! widened to `f64`. Arrays are always written as little-endian `f64`.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use ndarray::ShapeBuilder;
use regex::Regex;
use tracing::debug;

use crate::error::open_error;
use crate::{Error, Matrix, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Magic, version and header are padded to a multiple of this many bytes.
const HEADER_ALIGN: usize = 64;

static DESCR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]descr['"]\s*:\s*['"]([^'"]*)['"]"#).expect("descr pattern")
});
static FORTRAN_ORDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]fortran_order['"]\s*:\s*(True|False)"#).expect("fortran_order pattern")
});
static SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]shape['"]\s*:\s*\(([^)]*)\)"#).expect("shape pattern")
});
static TYPESTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([<>|=])([biuf])(\d+)$").expect("typestr pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    Uint,
    Float,
}

/// Element type of an array, parsed from an array-protocol type string such as `<f8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DType {
    kind: Kind,
    size: usize,
    order: ByteOrder,
}

impl DType {
    fn parse(descr: &str) -> Result<Self> {
        let caps = TYPESTR
            .captures(descr)
            .ok_or_else(|| Error::npy(format!("unsupported dtype {descr:?}")))?;

        let order = match &caps[1] {
            ">" => ByteOrder::Big,
            "=" if cfg!(target_endian = "big") => ByteOrder::Big,
            _ => ByteOrder::Little,
        };
        let kind = match &caps[2] {
            "b" => Kind::Bool,
            "i" => Kind::Int,
            "u" => Kind::Uint,
            _ => Kind::Float,
        };
        let size: usize = caps[3]
            .parse()
            .map_err(|_| Error::npy(format!("unsupported dtype {descr:?}")))?;

        let supported = match kind {
            Kind::Bool => size == 1,
            Kind::Int | Kind::Uint => matches!(size, 1 | 2 | 4 | 8),
            Kind::Float => matches!(size, 4 | 8),
        };
        if !supported {
            return Err(Error::npy(format!("unsupported dtype {descr:?}")));
        }

        Ok(Self { kind, size, order })
    }

    /// Decodes one element; `bytes` holds exactly `self.size` bytes.
    fn decode(self, bytes: &[u8]) -> f64 {
        let mut le = [0u8; 8];
        le[..self.size].copy_from_slice(bytes);
        if self.order == ByteOrder::Big {
            le[..self.size].reverse();
        }
        let raw = u64::from_le_bytes(le);
        let bits = self.size * 8;

        match self.kind {
            Kind::Bool => {
                if raw != 0 {
                    1.0
                } else {
                    0.0
                }
            }
            Kind::Uint => raw as f64,
            Kind::Int => {
                let shift = 64 - bits;
                ((raw << shift) as i64 >> shift) as f64
            }
            Kind::Float if self.size == 4 => f32::from_bits(raw as u32) as f64,
            Kind::Float => f64::from_bits(raw),
        }
    }
}

#[derive(Debug)]
struct Header {
    dtype: DType,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl Header {
    fn parse(text: &str) -> Result<Self> {
        let descr = DESCR
            .captures(text)
            .ok_or_else(|| Error::npy(format!("header has no plain 'descr': {text:?}")))?;
        let fortran_order = FORTRAN_ORDER
            .captures(text)
            .ok_or_else(|| Error::npy(format!("header has no 'fortran_order': {text:?}")))?;
        let shape = SHAPE
            .captures(text)
            .ok_or_else(|| Error::npy(format!("header has no 'shape': {text:?}")))?;

        let shape = shape[1]
            .split(',')
            .map(str::trim)
            .filter(|dim| !dim.is_empty())
            .map(|dim| {
                dim.trim_end_matches('L')
                    .parse::<usize>()
                    .map_err(|_| Error::npy(format!("bad dimension {dim:?} in shape")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            dtype: DType::parse(&descr[1])?,
            fortran_order: &fortran_order[1] == "True",
            shape,
        })
    }

    /// Shape as a matrix: 1-D arrays become a single column.
    fn matrix_dim(&self) -> Result<(usize, usize)> {
        match self.shape[..] {
            [n] => Ok((n, 1)),
            [rows, cols] => Ok((rows, cols)),
            _ => Err(Error::npy(format!(
                "expected a 1-D or 2-D array, found shape {:?}",
                self.shape
            ))),
        }
    }
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => Error::npy(format!("truncated {what}")),
        _ => Error::Io(err),
    })
}

/// Reads exactly `len` bytes, growing the buffer only as data actually arrives.
fn read_bounded<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    (&mut *reader).take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(Error::npy(format!(
            "truncated {what}: expected {len} bytes, found {}",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Decodes an array from `.npy` bytes.
pub fn read_npy<R: Read>(mut reader: R) -> Result<Matrix> {
    let mut preamble = [0u8; 8];
    read_exact_or(&mut reader, &mut preamble, "preamble")?;
    if &preamble[..6] != MAGIC {
        return Err(Error::npy("missing \\x93NUMPY magic"));
    }
    let (major, minor) = (preamble[6], preamble[7]);

    let header_len = match major {
        1 => {
            let mut len = [0u8; 2];
            read_exact_or(&mut reader, &mut len, "header length")?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            read_exact_or(&mut reader, &mut len, "header length")?;
            u32::from_le_bytes(len) as usize
        }
        _ => {
            return Err(Error::npy(format!(
                "unsupported format version {major}.{minor}"
            )))
        }
    };

    let header = read_bounded(&mut reader, header_len, "header")?;
    let header = String::from_utf8(header).map_err(|_| Error::npy("header is not text"))?;
    let header = Header::parse(&header)?;
    let (rows, cols) = header.matrix_dim()?;
    debug!(
        version = %format!("{major}.{minor}"),
        dtype = ?header.dtype,
        fortran_order = header.fortran_order,
        rows,
        cols,
        "decoded npy header"
    );

    let data_len = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(header.dtype.size))
        .ok_or_else(|| Error::npy(format!("shape {:?} is too large", header.shape)))?;
    let data = read_bounded(&mut reader, data_len, "array data")?;

    let values: Vec<f64> = data
        .chunks_exact(header.dtype.size)
        .map(|element| header.dtype.decode(element))
        .collect();

    let matrix = if header.fortran_order {
        Matrix::from_shape_vec((rows, cols).f(), values)
            .map(|m| m.as_standard_layout().into_owned())
    } else {
        Matrix::from_shape_vec((rows, cols), values)
    };
    matrix.map_err(|err| Error::npy(err.to_string()))
}

/// Encodes `matrix` as a version 1.0 `.npy` array of little-endian `f64`.
pub fn write_npy<W: Write>(writer: W, matrix: &Matrix) -> Result<()> {
    let (rows, cols) = matrix.dim();
    write_array(writer, &format!("({rows}, {cols})"), matrix.iter().copied())
}

/// Encodes `values` as a one-dimensional `.npy` array of shape `(N,)`.
pub fn write_npy_vector<W: Write>(writer: W, values: &[f64]) -> Result<()> {
    write_array(writer, &format!("({},)", values.len()), values.iter().copied())
}

fn write_array<W: Write>(
    mut writer: W,
    shape: &str,
    values: impl Iterator<Item = f64>,
) -> Result<()> {
    let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {shape}, }}");
    // magic + version + u16 length + header + trailing newline
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| Error::npy(format!("header for shape {shape} is too long")))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load(path: &Path) -> Result<Matrix> {
    let file = File::open(path).map_err(|err| open_error(path, err))?;
    let matrix = read_npy(BufReader::new(file))?;
    debug!(path = %path.display(), shape = ?matrix.dim(), "loaded npy array");
    Ok(matrix)
}

pub fn save(path: &Path, matrix: &Matrix) -> Result<()> {
    let file = File::create(path).map_err(|err| open_error(path, err))?;
    write_npy(BufWriter::new(file), matrix)?;
    debug!(path = %path.display(), shape = ?matrix.dim(), "saved npy array");
    Ok(())
}

/// Saves `values` as a one-dimensional array.
pub fn save_vector(path: &Path, values: &[f64]) -> Result<()> {
    let file = File::create(path).map_err(|err| open_error(path, err))?;
    write_npy_vector(BufWriter::new(file), values)?;
    debug!(path = %path.display(), len = values.len(), "saved npy vector");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn npy_bytes(major: u8, header: &str, data: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend([major, 0]);
        if major == 1 {
            bytes.extend((header.len() as u16).to_le_bytes());
        } else {
            bytes.extend((header.len() as u32).to_le_bytes());
        }
        bytes.extend(header.as_bytes());
        bytes.extend(data);
        bytes
    }

    #[test]
    fn written_header_is_aligned() {
        let matrix = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mut bytes = Vec::new();
        write_npy(&mut bytes, &matrix).unwrap();

        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 6 * 8);

        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (2, 3), }"));

        assert_eq!(read_npy(bytes.as_slice()).unwrap(), matrix);
    }

    #[test]
    fn reads_little_endian_int64() {
        let data: Vec<u8> = [1i64, 0, -3, 7]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let bytes = npy_bytes(
            1,
            "{'descr': '<i8', 'fortran_order': False, 'shape': (2, 2), }\n",
            &data,
        );
        assert_eq!(
            read_npy(bytes.as_slice()).unwrap(),
            array![[1.0, 0.0], [-3.0, 7.0]]
        );
    }

    #[test]
    fn reads_big_endian_float32() {
        let data: Vec<u8> = [0.5f32, -1.25]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let bytes = npy_bytes(
            1,
            "{'descr': '>f4', 'fortran_order': False, 'shape': (1, 2), }\n",
            &data,
        );
        assert_eq!(read_npy(bytes.as_slice()).unwrap(), array![[0.5, -1.25]]);
    }

    #[test]
    fn reads_small_signed_and_unsigned_ints() {
        let bytes = npy_bytes(
            1,
            "{'descr': '|i1', 'fortran_order': False, 'shape': (3,), }\n",
            &[0xff, 0x01, 0x80],
        );
        assert_eq!(
            read_npy(bytes.as_slice()).unwrap(),
            array![[-1.0], [1.0], [-128.0]]
        );

        let data: Vec<u8> = [65535u16, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = npy_bytes(
            1,
            "{'descr': '<u2', 'fortran_order': False, 'shape': (1, 2), }\n",
            &data,
        );
        assert_eq!(read_npy(bytes.as_slice()).unwrap(), array![[65535.0, 2.0]]);
    }

    #[test]
    fn reads_bool_fortran_order() {
        // column-major layout of [[1, 0, 1], [0, 0, 1]]
        let bytes = npy_bytes(
            1,
            "{'descr': '|b1', 'fortran_order': True, 'shape': (2, 3), }\n",
            &[1, 0, 0, 0, 1, 1],
        );
        let matrix = read_npy(bytes.as_slice()).unwrap();
        assert_eq!(matrix, array![[1.0, 0.0, 1.0], [0.0, 0.0, 1.0]]);
        assert!(matrix.is_standard_layout());
    }

    #[test]
    fn reads_version_two_header() {
        let data: Vec<u8> = [2.0f64].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = npy_bytes(
            2,
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1, 1), }\n",
            &data,
        );
        assert_eq!(read_npy(bytes.as_slice()).unwrap(), array![[2.0]]);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_npy(&b"PK\x03\x04 not an npy"[..]).unwrap_err();
        assert!(matches!(err, Error::Npy(_)));
    }

    #[test]
    fn rejects_truncated_data() {
        let bytes = npy_bytes(
            1,
            "{'descr': '<f8', 'fortran_order': False, 'shape': (2, 2), }\n",
            &[0u8; 12],
        );
        match read_npy(bytes.as_slice()).unwrap_err() {
            Error::Npy(msg) => assert!(msg.contains("truncated"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn huge_declared_shape_without_data() {
        let bytes = npy_bytes(
            1,
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1099511627776, 1), }\n",
            &[],
        );
        match read_npy(bytes.as_slice()).unwrap_err() {
            Error::Npy(msg) => assert!(msg.contains("truncated array data"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn huge_declared_header_length() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend([2, 0]);
        bytes.extend(u32::MAX.to_le_bytes());
        bytes.extend(b"{'descr': '<f8'");
        match read_npy(bytes.as_slice()).unwrap_err() {
            Error::Npy(msg) => assert!(msg.contains("truncated header"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn vector_is_written_one_dimensional() {
        let mut bytes = Vec::new();
        write_npy_vector(&mut bytes, &[1.0, 2.0, 3.0]).unwrap();

        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (3,)"), "{header}");
        assert_eq!(read_npy(bytes.as_slice()).unwrap(), array![[1.0], [2.0], [3.0]]);
    }

    #[test]
    fn rejects_unsupported_layouts() {
        for header in [
            "{'descr': '<c16', 'fortran_order': False, 'shape': (1, 1), }\n",
            "{'descr': '<f2', 'fortran_order': False, 'shape': (1, 1), }\n",
            "{'descr': [('a', '<f8')], 'fortran_order': False, 'shape': (1,), }\n",
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1, 1, 1), }\n",
            "{'descr': '<f8', 'fortran_order': False, 'shape': (), }\n",
        ] {
            let bytes = npy_bytes(1, header, &[0u8; 16]);
            assert!(
                matches!(read_npy(bytes.as_slice()), Err(Error::Npy(_))),
                "accepted {header}"
            );
        }
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.npy");
        assert!(matches!(load(&path), Err(Error::FileNotFound(p)) if p == path));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.npy");
        let matrix = array![[0.0, 1.0], [1.0, 0.0], [0.25, -2.0]];
        save(&path, &matrix).unwrap();
        assert_eq!(load(&path).unwrap(), matrix);
    }
}
