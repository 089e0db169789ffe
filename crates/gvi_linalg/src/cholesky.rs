//! Lower Cholesky factorization of a symmetric positive-definite matrix.

use gvi_error::GviError;

use crate::{Float, Matrix};

/// Computes the lower-triangular `L` such that `L * L^T == m`.
///
/// # Errors
///
/// Returns [`GviError::InvalidCovariance`] if `m` is not square, or
/// [`GviError::NotPositiveDefinite`] if a diagonal pivot is not strictly
/// positive during the factorization.
pub fn cholesky_lower(m: &Matrix<Float>) -> Result<Matrix<Float>, GviError> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(GviError::InvalidCovariance(format!(
                    "matrix is {}x{}, expected square",
                    n,
                    m.ncols()
        )));
    }

    let mut l = Matrix::<Float>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = m[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(GviError::NotPositiveDefinite(format!(
                                "pivot at ({i},{i}) is {sum}, expected > 0"
                    )));
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Inverts a symmetric positive-definite matrix via its Cholesky factor:
/// `L` is inverted by forward substitution, then `m^-1 = L^-T * L^-1`.
///
/// Used to turn a factor's marginal covariance `Σ_k` into its local
/// precision `Λ_k` for the variational partials in
/// ("`V'_μ = Λ_k · E[vmu]`").
///
/// # Errors
///
/// Returns [`GviError::NotPositiveDefinite`] if `m` is not positive
/// definite.
pub fn cholesky_inverse(m: &Matrix<Float>) -> Result<Matrix<Float>, GviError> {
    let l = cholesky_lower(m)?;
    let n = l.nrows();
    let mut l_inv = Matrix::<Float>::zeros((n, n));
    for i in 0..n {
        l_inv[[i, i]] = 1.0 / l[[i, i]];
        for j in 0..i {
            let mut sum = 0.0;
            for k in j..i {
                sum += l[[i, k]] * l_inv[[k, j]];
            }
            l_inv[[i, j]] = -sum / l[[i, i]];
        }
    }
    Ok(l_inv.t().dot(&l_inv))
}

/// Solves `m * x = b` for a symmetric positive-definite `m`, via forward
/// substitution (`L*y = b`) followed by back substitution (`L^T*x = y`)
/// against the Cholesky factor.
///
/// # Errors
///
/// Returns [`GviError::NotPositiveDefinite`] if `m` is not positive
/// definite.
pub fn cholesky_solve(m: &Matrix<Float>, b: &crate::Vector<Float>) -> Result<crate::Vector<Float>, GviError> {
    let l = cholesky_lower(m)?;
    let n = l.nrows();

    let mut y = crate::Vector::<Float>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    let mut x = crate::Vector::<Float>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn reconstructs_identity() {
        let m = Matrix::<Float>::eye(3);
        let l = cholesky_lower(&m).expect("identity is PD");
        assert_eq!(l, Matrix::<Float>::eye(3));
    }

    #[test]
    fn reconstructs_spd_matrix() {
        let m: Matrix<Float> = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky_lower(&m).expect("matrix is PD");
        let reconstructed = l.dot(&l.t());
        for (a, b) in m.iter().zip(reconstructed.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn rejects_non_positive_definite() {
        let m: Matrix<Float> = array![[1.0, 2.0], [2.0, 1.0]];
        let err = cholesky_lower(&m).expect_err("indefinite matrix must fail");
        assert_eq!(err.code(), "not_positive_definite");
    }

    #[test]
    fn rejects_non_square() {
        let m = Matrix::<Float>::zeros((2, 3));
        let err = cholesky_lower(&m).expect_err("non-square matrix must fail");
        assert_eq!(err.code(), "invalid_covariance");
    }

    #[test]
    fn cholesky_inverse_of_identity_is_identity() {
        let inv = cholesky_inverse(&Matrix::<Float>::eye(3)).expect("identity is PD");
        assert_eq!(inv, Matrix::<Float>::eye(3));
    }

    #[test]
    fn cholesky_inverse_round_trips_through_product() {
        let m: Matrix<Float> = array![[4.0, 2.0], [2.0, 3.0]];
        let inv = cholesky_inverse(&m).expect("matrix is PD");
        let product = m.dot(&inv);
        for (a, b) in product.iter().zip(Matrix::<Float>::eye(2).iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn cholesky_solve_matches_known_solution() {
        let m: Matrix<Float> = array![[4.0, 2.0], [2.0, 3.0]];
        let x_expected = crate::Vector::from_vec(vec![1.0, -2.0]);
        let b = m.dot(&x_expected);
        let x = cholesky_solve(&m, &b).expect("matrix is PD");
        for (a, c) in x.iter().zip(x_expected.iter()) {
            assert!((a - c).abs() < 1e-9);
        }
    }
}
