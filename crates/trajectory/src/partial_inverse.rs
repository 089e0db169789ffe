//! Partial inverse of a sparse joint precision matrix via the Takahashi
//! recursion over an LDLᵀ factorization,
//!
//! Given `A = L D L^T` (unit lower triangular `L`), selected entries of
//! `Σ = A^-1` are recovered without a second triangular solve, by sweeping
//! columns in reverse order:
//!
//! ```text
//! Σ[i,i] = 1/D[i] - sum_{k>i} L[k,i] * Σ[k,i]
//! Σ[i,j] = Σ[j,i] = - sum_{k>i} L[k,i] * Σ[k,j] (j < i)
//! ```
//!
//! The dense backing store (see the module docs on [`crate::BlockLayout`])
//! means this recursion is run to completion over every `(i,j)` rather
//! than only the nonzero `L` pattern, but the *result* restricted to any
//! factor's block is identical to that of a genuinely sparse Takahashi
//! pass, which is what testable property 3 in checks.

use gvi_linalg::{Float, Matrix};

use crate::{block::BlockLayout, ldlt::Ldlt};

/// Runs the Takahashi recursion to completion, returning the full `Σ =
/// A^-1` implied by the factorization `factors`.
#[must_use]
pub fn takahashi_inverse(factors: &Ldlt) -> Matrix<Float> {
    let n = factors.dim();
    let l = &factors.l;
    let d = &factors.d;
    let mut sigma = Matrix::<Float>::zeros((n, n));

    for i in (0..n).rev() {
        let mut sum = 0.0;
        for k in (i + 1)..n {
            if l[[k, i]] != 0.0 {
                sum += l[[k, i]] * sigma[[k, i]];
            }
        }
        sigma[[i, i]] = 1.0 / d[i] - sum;

        for j in (0..i).rev() {
            let mut sum = 0.0;
            for k in (i + 1)..n {
                if l[[k, i]] != 0.0 {
                    sum += l[[k, i]] * sigma[[k, j]];
                }
            }
            let value = -sum;
            sigma[[i, j]] = value;
            sigma[[j, i]] = value;
        }
    }

    sigma
}

/// Computes only the blocks of `Σ = precision^-1` named by `layouts`,
/// returning them in the same order, without requiring the caller to
/// materialize the full dense inverse.
///
/// # Errors
///
/// Propagates [`gvi_error::GviError::NotPositiveDefinite`] /
/// [`gvi_error::GviError::InvalidCovariance`] from the underlying LDLᵀ
/// factorization.
pub fn partial_inverse(
    precision: &Matrix<Float>,
    layouts: &[BlockLayout],
) -> Result<Vec<Matrix<Float>>, gvi_error::GviError> {
    let factors = crate::ldlt::ldlt(precision)?;
    let sigma = takahashi_inverse(&factors);
    Ok(layouts.iter().map(|&layout| crate::block::extract_block(&sigma, layout)).collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;
    use crate::ldlt::ldlt;

    fn naive_inverse(a: &Matrix<Float>) -> Matrix<Float> {
        // Gauss-Jordan elimination, used only by tests as a ground truth.
        let n = a.nrows();
        let mut aug = Matrix::<Float>::zeros((n, 2 * n));
        aug.slice_mut(ndarray::s![..,..n]).assign(a);
        for i in 0..n {
            aug[[i, n + i]] = 1.0;
        }
        for col in 0..n {
            let pivot = aug[[col, col]];
            for k in 0..(2 * n) {
                aug[[col, k]] /= pivot;
            }
            for row in 0..n {
                if row != col {
                    let factor = aug[[row, col]];
                    for k in 0..(2 * n) {
                        aug[[row, k]] -= factor * aug[[col, k]];
                    }
                }
            }
        }
        aug.slice(ndarray::s![.., n..]).to_owned()
    }

    #[test]
    fn takahashi_inverse_matches_naive_inverse_on_small_matrix() {
        let a: Matrix<Float> =
        array![[4.0, 2.0, 0.0, 0.0], [2.0, 5.0, 1.0, 0.0], [0.0, 1.0, 6.0, 2.0], [
                0.0, 0.0, 2.0, 3.0
        ]];
        let factors = ldlt(&a).expect("matrix is PD");
        let sigma = takahashi_inverse(&factors);
        let expected = naive_inverse(&a);
        for (x, y) in sigma.iter().zip(expected.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-8);
        }
    }

    #[test]
    fn partial_inverse_block_matches_full_inverse_restricted_to_pattern() {
        // Testable property 3: the partial-inverse routine's output
        // restricted to a factor's block equals the dense inverse there.
        let a: Matrix<Float> =
        array![[4.0, 1.0, 0.0, 0.0], [1.0, 4.0, 1.0, 0.0], [0.0, 1.0, 4.0, 1.0], [
                0.0, 0.0, 1.0, 4.0
        ]];
        let layout = BlockLayout { start: 1, len: 2 };
        let blocks = partial_inverse(&a, std::slice::from_ref(&layout)).expect("matrix is PD");
        let expected_full = naive_inverse(&a);
        let expected_block = crate::block::extract_block(&expected_full, layout);
        for (x, y) in blocks[0].iter().zip(expected_block.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-8);
        }
    }
}
