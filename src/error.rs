use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort one of the evaluation tools.
#[derive(Debug, Error)]
pub enum Error {
    /// A path that has to exist does not.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Two inputs differ in shape, or an input does not have the shape a tool requires.
    #[error("shape mismatch: {what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Values outside the domain a computation is defined on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A zero-sized matrix, or a text file without any data row.
    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("malformed npy data: {0}")]
    Npy(String),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Png(#[from] png::EncodingError),
}

impl Error {
    pub(crate) fn npy(message: impl Into<String>) -> Self {
        Error::Npy(message.into())
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Maps a `NotFound` I/O failure on `path` to [`Error::FileNotFound`].
pub(crate) fn open_error(path: &std::path::Path, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::FileNotFound(path.to_path_buf())
    } else {
        Error::Io(err)
    }
}
