//! Evaluation tools for the DiSCo connectivity challenge.
//!
//! Each binary in `src/bin` is a single pass over in-memory matrices:
//! confusion labelling of a binary prediction against its ground truth,
//! lower-triangle Pearson correlation of connectivity matrices, and
//! conversion between `.npy` and text matrices.

pub mod cli;
pub mod convert;
pub mod correlation;
mod error;
pub mod heatmap;
pub mod metrics;
pub mod npy;
pub mod txt;

pub use error::{Error, Result};

/// Dense row-major matrix every file format decodes to.
pub type Matrix = ndarray::Array2<f64>;
