//! Pearson correlation between connectivity matrices.

use tracing::debug;

use crate::{Error, Matrix, Result};

/// Connectivity matrices are indexed by 16 brain regions.
pub const CONNECTIVITY_SIDE: usize = 16;

/// Values strictly below the main diagonal, row by row.
pub fn lower_triangle(matrix: &Matrix) -> Vec<f64> {
    matrix
        .rows()
        .into_iter()
        .enumerate()
        .flat_map(|(i, row)| row.into_iter().take(i).copied().collect::<Vec<_>>())
        .collect()
}

/// Sample Pearson correlation coefficient of `x` and `y`.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(Error::ShapeMismatch {
            what: "second sample".into(),
            expected: (x.len(), 1),
            found: (y.len(), 1),
        });
    }
    if x.is_empty() {
        return Err(Error::EmptyInput("no samples to correlate".into()));
    }
    if x.len() < 2 {
        return Err(Error::InvalidInput(
            "at least two samples are needed for a correlation".into(),
        ));
    }

    let is_constant = |sample: &[f64]| sample.iter().all(|&v| v == sample[0]);
    if is_constant(x) || is_constant(y) {
        return Err(Error::InvalidInput(
            "correlation is undefined for a constant sample".into(),
        ));
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let r = sxy / (sxx * syy).sqrt();
    if !r.is_finite() {
        return Err(Error::InvalidInput("samples contain non-finite values".into()));
    }
    Ok(r.clamp(-1.0, 1.0))
}

fn check_connectivity_shape(matrix: &Matrix, what: &str) -> Result<()> {
    let expected = (CONNECTIVITY_SIDE, CONNECTIVITY_SIDE);
    if matrix.dim() != expected {
        return Err(Error::ShapeMismatch {
            what: what.into(),
            expected,
            found: matrix.dim(),
        });
    }
    Ok(())
}

/// Pearson r between the lower triangles of two 16x16 connectivity matrices.
pub fn connectivity_correlation(ground_truth: &Matrix, estimate: &Matrix) -> Result<f64> {
    check_connectivity_shape(ground_truth, "ground truth connectivity matrix")?;
    check_connectivity_shape(estimate, "estimated connectivity matrix")?;

    let gt = lower_triangle(ground_truth);
    let est = lower_triangle(estimate);
    debug!(samples = gt.len(), "correlating lower triangles");
    pearson(&gt, &est)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn lower_triangle_excludes_diagonal() {
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        assert_eq!(lower_triangle(&m), vec![4.0, 7.0, 8.0]);
    }

    #[test]
    fn known_coefficient() {
        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 5.0, 4.0]).unwrap();
        assert_abs_diff_eq!(r, 0.7181848464596079, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_samples() {
        assert!(matches!(pearson(&[], &[]), Err(Error::EmptyInput(_))));
        assert!(matches!(pearson(&[1.0], &[2.0]), Err(Error::InvalidInput(_))));
        assert!(matches!(
            pearson(&[1.0, 2.0], &[1.0]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn constant_sample_with_inexact_mean() {
        let y: Vec<f64> = (0..120).map(|i| (i % 7) as f64).collect();
        assert!(matches!(
            pearson(&vec![0.1; 120], &y),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            pearson(&y, &vec![0.1; 120]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn constant_connectivity_matrix() {
        let gt = Matrix::from_elem((16, 16), 0.1);
        let est = Matrix::from_shape_fn((16, 16), |(i, j)| (i * 16 + j) as f64);
        assert!(matches!(
            connectivity_correlation(&gt, &est),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn connectivity_requires_16_by_16() {
        let good = Matrix::from_shape_fn((16, 16), |(i, j)| (i * 16 + j) as f64);
        let bad = Matrix::zeros((15, 16));

        match connectivity_correlation(&good, &bad).unwrap_err() {
            Error::ShapeMismatch { what, found, .. } => {
                assert!(what.starts_with("estimated"));
                assert_eq!(found, (15, 16));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            connectivity_correlation(&bad, &good),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn connectivity_ignores_upper_triangle_and_diagonal() {
        let gt = Matrix::from_shape_fn((16, 16), |(i, j)| (i * 3 + j * 7) as f64);
        let mut est = gt.mapv(|v| 2.0 * v + 1.0);
        for i in 0..16 {
            for j in i..16 {
                est[(i, j)] = -100.0 * (i + j) as f64;
            }
        }
        let r = connectivity_correlation(&gt, &est).unwrap();
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
    }

    fn sample() -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(-1000.0f64..1000.0, 3..60)
            .prop_filter("needs spread", |v| {
                let min = v.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                max - min > 1e-3
            })
    }

    proptest! {
        #[test]
        fn self_correlation_is_one(x in sample()) {
            let neg: Vec<f64> = x.iter().map(|v| -v).collect();
            prop_assert!((pearson(&x, &x).unwrap() - 1.0).abs() < 1e-9);
            prop_assert!((pearson(&x, &neg).unwrap() + 1.0).abs() < 1e-9);
        }

        #[test]
        fn invariant_to_positive_affine_maps(
            (x, y) in (3usize..40).prop_flat_map(|n| (
                proptest::collection::vec(-100.0f64..100.0, n),
                proptest::collection::vec(-100.0f64..100.0, n),
            )),
            scale in 0.1f64..50.0,
            shift in -500.0f64..500.0,
        ) {
            if let Ok(r) = pearson(&x, &y) {
                let scaled: Vec<f64> = y.iter().map(|v| scale * v + shift).collect();
                let r2 = pearson(&x, &scaled).unwrap();
                prop_assert!((r - r2).abs() < 1e-6);
                prop_assert!((-1.0..=1.0).contains(&r));
            }
        }
    }
}
