//! Eigenvalue routines for small symmetric matrices.
//!
//! Neither the teacher nor the rest of the example pack pulls in a LAPACK
//! binding for `ndarray`, so the two routines needed by this workspace
//! (the Gauss-Hermite node solver and the symmetric eigendecomposition
//! used for matrix square roots and pseudoinverses) are implemented
//! in-crate with textbook algorithms: an implicit-shift QL sweep for the
//! symmetric tridiagonal case, and cyclic Jacobi rotations for the dense
//! symmetric case.

use gvi_error::GviError;

use crate::{Float, Matrix, Vector};

/// Eigenvalues (ascending) of a real symmetric tridiagonal matrix with
/// diagonal `diag` and off-diagonal `offdiag` (length `diag.len() - 1`).
///
/// Used by `gauss_hermite` to find the Hermite-polynomial roots, which
/// are the eigenvalues of the Jacobi matrix with zero diagonal and
/// off-diagonals `sqrt(i)` for `i = 1..p-1`.
#[must_use]
pub fn tridiagonal_eigen(diag: &[Float], offdiag: &[Float]) -> Vec<Float> {
    let n = diag.len();
    let mut d = diag.to_vec();
    let mut e = vec![0.0; n];
    e[..offdiag.len()].copy_from_slice(offdiag);

    for l in 0..n {
        let mut iter = 0;
        loop {
            let mut m = l;
            while m < n - 1 {
                let dd = d[m].abs() + d[m + 1].abs();
                if e[m].abs() <= Float::EPSILON * dd {
                    break;
                }
                m += 1;
            }
            if m == l {
                break;
            }
            assert!(iter < 64, "tridiagonal eigenvalue iteration failed to converge");
            iter += 1;

            let mut g = (d[l + 1] - d[l]) / (2.0 * e[l]);
            let mut r = g.hypot(1.0);
            g = d[m] - d[l] + e[l] / (g + r.copysign(g));

            let (mut s, mut c) = (1.0, 1.0);
            let mut p = 0.0;
            for i in (l..m).rev() {
                let mut f = s * e[i];
                let b = c * e[i];
                r = f.hypot(g);
                e[i + 1] = r;
                if r == 0.0 {
                    d[i + 1] -= p;
                    e[m] = 0.0;
                    break;
                }
                s = f / r;
                c = g / r;
                let delta = d[i + 1] - p;
                r = (d[i] - delta) * s + 2.0 * c * b;
                p = s * r;
                d[i + 1] = delta + p;
                g = c * r - b;
                f = e[i];
                // eigenvector accumulation intentionally omitted: callers
                // only need the Hermite node locations, not the basis.
                let _ = f;
            }
            d[l] -= p;
            e[l] = g;
            e[m] = 0.0;
        }
    }
    d.sort_by(|a, b| a.partial_cmp(b).expect("eigenvalues are never NaN"));
    d
}

/// Eigenvalues (ascending) and corresponding eigenvectors (as columns of
/// the returned matrix) of a dense symmetric matrix, via cyclic Jacobi
/// rotations.
///
/// # Errors
///
/// Returns [`GviError::InvalidCovariance`] if `m` is not square.
pub fn symmetric_eigen(m: &Matrix<Float>) -> Result<(Vector<Float>, Matrix<Float>), GviError> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(GviError::InvalidCovariance(format!(
            "matrix is {}x{}, expected square",
            n,
            m.ncols()
        )));
    }

    let mut a = m.clone();
    let mut v = Matrix::<Float>::eye(n);

    const MAX_SWEEPS: usize = 100;
    for _ in 0..MAX_SWEEPS {
        let mut off_diagonal_sum = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal_sum += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diagonal_sum.sqrt() < 1e-13 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < Float::EPSILON {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                let a_pp = a[[p, p]];
                let a_qq = a[[q, q]];
                let a_pq = a[[p, q]];

                a[[p, p]] = a_pp - t * a_pq;
                a[[q, q]] = a_qq + t * a_pq;
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for i in 0..n {
                    if i != p && i != q {
                        let a_ip = a[[i, p]];
                        let a_iq = a[[i, q]];
                        a[[i, p]] = c * a_ip - s * a_iq;
                        a[[p, i]] = a[[i, p]];
                        a[[i, q]] = s * a_ip + c * a_iq;
                        a[[q, i]] = a[[i, q]];
                    }
                }
                for i in 0..n {
                    let v_ip = v[[i, p]];
                    let v_iq = v[[i, q]];
                    v[[i, p]] = c * v_ip - s * v_iq;
                    v[[i, q]] = s * v_ip + c * v_iq;
                }
            }
        }
    }

    let mut eigenvalues: Vec<Float> = (0..n).map(|i| a[[i, i]]).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eigenvalues[i].partial_cmp(&eigenvalues[j]).expect("no NaNs"));

    let sorted_values = Vector::from_vec(order.iter().map(|&i| eigenvalues[i]).collect());
    let mut sorted_vectors = Matrix::<Float>::zeros((n, n));
    for (new_col, &old_col) in order.iter().enumerate() {
        for row in 0..n {
            sorted_vectors[[row, new_col]] = v[[row, old_col]];
        }
    }
    eigenvalues.clear();

    Ok((sorted_values, sorted_vectors))
}

/// The principal (symmetric, positive semi-definite) square root of a
/// symmetric positive semi-definite matrix, via its eigendecomposition.
///
/// # Errors
///
/// Propagates [`symmetric_eigen`]'s errors, and returns
/// [`GviError::NotPositiveDefinite`] if any eigenvalue is negative beyond
/// floating-point tolerance.
pub fn sqrtm(m: &Matrix<Float>) -> Result<Matrix<Float>, GviError> {
    let (eigenvalues, eigenvectors) = symmetric_eigen(m)?;
    if eigenvalues.iter().any(|&lambda| lambda < -1e-9) {
        return Err(GviError::NotPositiveDefinite(
            "matrix square root requires a positive semi-definite operand".to_string(),
        ));
    }
    let sqrt_diag = eigenvalues.mapv(|lambda| lambda.max(0.0).sqrt());
    let n = eigenvectors.nrows();
    let mut scaled = eigenvectors.clone();
    for j in 0..n {
        for i in 0..n {
            scaled[[i, j]] *= sqrt_diag[j];
        }
    }
    Ok(scaled.dot(&eigenvectors.t()))
}

/// The Moore-Penrose pseudoinverse of a symmetric positive semi-definite
/// matrix, via its eigendecomposition, truncating eigenvalues below
/// `tolerance`.
///
/// # Errors
///
/// Propagates [`symmetric_eigen`]'s errors.
pub fn pinv_symmetric(m: &Matrix<Float>, tolerance: Float) -> Result<Matrix<Float>, GviError> {
    let (eigenvalues, eigenvectors) = symmetric_eigen(m)?;
    let n = eigenvectors.nrows();
    let mut scaled = eigenvectors.clone();
    for j in 0..n {
        let lambda = eigenvalues[j];
        let inv = if lambda.abs() > tolerance { 1.0 / lambda } else { 0.0 };
        for i in 0..n {
            scaled[[i, j]] *= inv;
        }
    }
    Ok(scaled.dot(&eigenvectors.t()))
}
