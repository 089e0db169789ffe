//! General linear solve for square, not-necessarily-symmetric matrices,
//! via Gaussian elimination with partial pivoting.
//!
//! Needed by `linear_cs`'s boundary-value solve, where
//! the transition-matrix block `Φ₁₂` is square but has no symmetry to
//! exploit, so neither [`crate::cholesky`] nor [`crate::eig`] applies.

use gvi_error::GviError;

use crate::{Float, Matrix, Vector};

/// Solves `a * x = b` for square `a`, via Gaussian elimination with
/// partial pivoting.
///
/// # Errors
///
/// Returns [`GviError::InvalidCovariance`] if `a` is not square, or
/// [`GviError::NotPositiveDefinite`] if `a` is numerically singular (no
/// usable pivot in some column) — the caller-facing failure this maps to
/// is context-dependent (`linear_cs` reports it as `boundary_infeasible`
///, "Φ₁₂ singular... raise `boundary_infeasible`").
pub fn lu_solve(a: &Matrix<Float>, b: &Vector<Float>) -> Result<Vector<Float>, GviError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(GviError::InvalidCovariance(format!(
                    "matrix is {}x{}, expected square",
                    n,
                    a.ncols()
        )));
    }
    assert_eq!(b.len(), n, "right-hand side length must match matrix dimension");

    let mut m = a.clone();
    let mut x = b.clone();

    for col in 0..n {
        let pivot_row = (col..n)
        .max_by(|&i, &j| m[[i, col]].abs().partial_cmp(&m[[j, col]].abs()).expect("no NaNs"))
        .expect("col < n");
        if m[[pivot_row, col]].abs() < 1e-12 {
            return Err(GviError::NotPositiveDefinite(format!(
                        "matrix is singular: no usable pivot in column {col}"
            )));
        }
        if pivot_row != col {
            for k in 0..n {
                m.swap((col, k), (pivot_row, k));
            }
            x.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            x[row] -= factor * x[col];
        }
    }

    let mut result = Vector::<Float>::zeros(n);
    for row in (0..n).rev() {
        let mut sum = x[row];
        for k in (row + 1)..n {
            sum -= m[[row, k]] * result[k];
        }
        result[row] = sum / m[[row, row]];
    }
    Ok(result)
}

/// Inverts a square matrix by solving `a * x_j = e_j` for every standard
/// basis vector, via [`lu_solve`].
///
/// # Errors
///
/// Propagates [`lu_solve`]'s errors.
pub fn general_inverse(a: &Matrix<Float>) -> Result<Matrix<Float>, GviError> {
    let n = a.nrows();
    let mut inverse = Matrix::<Float>::zeros((n, n));
    for col in 0..n {
        let mut e = Vector::<Float>::zeros(n);
        e[col] = 1.0;
        let x = lu_solve(a, &e)?;
        for row in 0..n {
            inverse[[row, col]] = x[row];
        }
    }
    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn solves_known_nonsymmetric_system() {
        let a: Matrix<Float> = array![[2.0, 1.0], [1.0, 3.0]];
        let x_expected = Vector::from_vec(vec![1.0, -1.0]);
        let b = a.dot(&x_expected);
        let x = lu_solve(&a, &b).expect("nonsingular system");
        for (got, want) in x.iter().zip(x_expected.iter()) {
            assert_relative_eq!(got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn solve_requires_partial_pivoting_on_a_zero_leading_entry() {
        let a: Matrix<Float> = array![[0.0, 1.0], [1.0, 1.0]];
        let b = Vector::from_vec(vec![2.0, 3.0]);
        let x = lu_solve(&a, &b).expect("nonsingular after pivoting");
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_singular_matrix() {
        let a: Matrix<Float> = array![[1.0, 2.0], [2.0, 4.0]];
        let b = Vector::from_vec(vec![1.0, 2.0]);
        let err = lu_solve(&a, &b).expect_err("rank-deficient matrix must fail");
        assert_eq!(err.code(), "not_positive_definite");
    }

    #[test]
    fn general_inverse_of_identity_is_identity() {
        let inv = general_inverse(&Matrix::<Float>::eye(3)).expect("identity is nonsingular");
        assert_eq!(inv, Matrix::<Float>::eye(3));
    }

    #[test]
    fn general_inverse_round_trips_through_product() {
        let a: Matrix<Float> = array![[4.0, 1.0], [2.0, 3.0]];
        let inv = general_inverse(&a).expect("nonsingular matrix");
        let product = a.dot(&inv);
        for (got, want) in product.iter().zip(Matrix::<Float>::eye(2).iter()) {
            assert_relative_eq!(got, want, epsilon = 1e-9);
        }
    }
}
