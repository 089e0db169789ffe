//! Numeric LDLᵀ factorization of a symmetric matrix in natural (already
//! good, factor-graph) ordering.
//!
//! The symbolic phase is a no-op here: the joint
//! precision is stored as a dense [`Matrix`] (see `crate::BlockLayout`'s
//! module docs), so there is no fill-in pattern to precompute separately
//! from the numeric factorization.

use gvi_error::GviError;
use gvi_linalg::{Float, Matrix};

/// The factors of `A = L * diag(d) * L^T`, with `l` unit lower triangular.
#[derive(Debug, Clone)]
pub struct Ldlt {
    /// Unit lower triangular factor (diagonal is implicitly `1`).
    pub l: Matrix<Float>,
    /// The diagonal factor `D`, stored as a vector of its entries.
    pub d: Vec<Float>,
}

impl Ldlt {
    /// `det(A) = prod(D)`, read directly from the diagonal factor per
    ///
    #[must_use]
    pub fn determinant(&self) -> Float {
        self.d.iter().product()
    }

    /// Number of rows/columns of the factorized matrix.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.d.len()
    }
}

/// Factorizes symmetric `a` as `L D L^T` with `L` unit lower triangular.
///
/// # Errors
///
/// Returns [`GviError::InvalidCovariance`] if `a` is not square, or
/// [`GviError::NotPositiveDefinite`] if a pivot `D_ii <= 0` is encountered
/// (the `not_positive_definite` failure, surfaced to
/// the optimizer's step-rejection path).
pub fn ldlt(a: &Matrix<Float>) -> Result<Ldlt, GviError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(GviError::InvalidCovariance(format!(
                    "matrix is {}x{}, expected square",
                    n,
                    a.ncols()
        )));
    }

    let mut l = Matrix::<Float>::eye(n);
    let mut d = vec![0.0; n];

    for j in 0..n {
        let mut sum = a[[j, j]];
        for k in 0..j {
            sum -= l[[j, k]] * l[[j, k]] * d[k];
        }
        if sum <= 0.0 {
            return Err(GviError::NotPositiveDefinite(format!(
                        "LDLT pivot at ({j},{j}) is {sum}, expected > 0"
            )));
        }
        d[j] = sum;

        for i in (j + 1)..n {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]] * d[k];
            }
            l[[i, j]] = sum / d[j];
        }
    }

    Ok(Ldlt { l, d })
}
