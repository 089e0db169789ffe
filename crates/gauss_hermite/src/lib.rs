//! Gauss-Hermite cubature: deterministic approximation of
//! `E[f(X)]` for `X ~ N(mean, cov)` and matrix-valued `f`, grounded
//! directly on `GaussHermite.h` in `examples/original_source/` (the
//! `getSigmaPts`/`getWeights`/`Integrate` triple).

#![allow(clippy::module_name_repetitions)]

use gvi_error::GviError;
use gvi_linalg::{cholesky::cholesky_lower, Float, Matrix, Vector};

/// One-dimensional Gauss-Hermite nodes and weights for a given
/// polynomial degree `p`.
#[derive(Debug, Clone)]
struct NodesAndWeights {
    p: usize,
    nodes: Vec<Float>,
    weights: Vec<Float>,
}

fn hermite_polynomial(degree: usize, x: Float) -> Float {
    match degree {
        0 => 1.0,
        1 => x,
        _ => {
            let (mut h0, mut h1) = (1.0, x);
            for k in 1..degree {
                let h2 = x * h1 - (k as Float) * h0;
                h0 = h1;
                h1 = h2;
            }
            h1
        }
    }
}

fn factorial(n: usize) -> Float {
    (1..=n).fold(1.0, |acc, k| acc * (k as Float))
}

/// Computes the degree-`p` Hermite nodes (roots of `H_p`, as eigenvalues
/// of the zero-diagonal Jacobi matrix with off-diagonals `sqrt(1..p-1)`)
/// and weights `w_i = p! / (p^2 * H_{p-1}(x_i)^2)`.
fn nodes_and_weights(p: usize) -> NodesAndWeights {
    assert!(p >= 1, "Gauss-Hermite degree must be at least 1");
    let nodes = if p == 1 {
        vec![0.0]
    } else {
        let diag = vec![0.0; p];
        let offdiag: Vec<Float> = (1..p).map(|i| (i as Float).sqrt()).collect();
        gvi_linalg::eig::tridiagonal_eigen(&diag, &offdiag)
    };
    let p_factorial = factorial(p);
    let p_squared = (p as Float) * (p as Float);
    let weights = nodes
    .iter()
    .map(|&x| {
            let h = hermite_polynomial(p - 1, x);
            p_factorial / (p_squared * h * h)
    })
    .collect();
    NodesAndWeights { p, nodes, weights }
}

/// Gauss-Hermite cubature over a fixed dimension `dim`, caching
/// nodes/weights per degree and the Cholesky factor of the covariance,
/// contract ("the integrator recomputes nodes/
/// weights only when `p` changes, and reshapes `L` when `P` changes").
#[derive(Debug, Clone)]
pub struct GaussHermite {
    dim: usize,
    mean: Vector<Float>,
    cholesky_l: Matrix<Float>,
    nodes_weights: NodesAndWeights,
    max_cubature_points: usize,
}

impl GaussHermite {
    /// Builds a cubature rule of degree `p` over dimension `dim`, for
    /// `X ~ N(mean, covariance)`.
    ///
    /// # Errors
    ///
    /// Returns [`GviError::InvalidCovariance`] if `covariance` is not
    /// positive definite, or [`GviError::CurseOfDimensionality`] if
    /// `p.pow(dim)` exceeds `max_cubature_points`.
    pub fn new(
        p: usize,
        dim: usize,
        mean: Vector<Float>,
        covariance: &Matrix<Float>,
        max_cubature_points: usize,
    ) -> Result<Self, GviError> {
        check_dimension_cap(p, dim, max_cubature_points)?;
        let cholesky_l = cholesky_lower(covariance)?;
        Ok(Self { dim, mean, cholesky_l, nodes_weights: nodes_and_weights(p), max_cubature_points })
    }

    /// The cubature's polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.nodes_weights.p
    }

    /// The cubature's dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Updates the mean about which cubature points are centered, without
    /// recomputing nodes, weights, or the Cholesky factor.
    pub fn update_mean(&mut self, mean: Vector<Float>) {
        self.mean = mean;
    }

    /// Updates the covariance, reshaping the cached Cholesky factor `L`.
    ///
    /// # Errors
    ///
    /// Returns [`GviError::InvalidCovariance`] if `covariance` is not
    /// positive definite.
    pub fn update_covariance(&mut self, covariance: &Matrix<Float>) -> Result<(), GviError> {
        self.cholesky_l = cholesky_lower(covariance)?;
        Ok(())
    }

    /// Changes the polynomial degree, recomputing nodes and weights only
    /// if it actually differs from the cached degree.
    ///
    /// # Errors
    ///
    /// Returns [`GviError::CurseOfDimensionality`] if `p.pow(dim)` exceeds
    /// the configured cap.
    pub fn set_degree(&mut self, p: usize) -> Result<(), GviError> {
        if p != self.nodes_weights.p {
            check_dimension_cap(p, self.dim, self.max_cubature_points)?;
            self.nodes_weights = nodes_and_weights(p);
        }
        Ok(())
    }

    /// Approximates `E[f(X)]` for `X ~ N(mean, covariance)`, `f` a
    /// function returning a fixed-shape matrix, by summing over the
    /// tensor-product grid in lexicographic (row-major) index order, the
    /// ordering guarantee requires for bitwise
    /// reproducibility.
    pub fn integrate<F>(&self, mut f: F) -> Matrix<Float>
    where
    F: FnMut(&Vector<Float>) -> Matrix<Float>,
    {
        let p = self.nodes_weights.p;
        let nodes = &self.nodes_weights.nodes;
        let weights = &self.nodes_weights.weights;

        if self.dim == 1 {
            let mut result: Option<Matrix<Float>> = None;
            for i in 0..p {
                let xi = self.cholesky_l[[0, 0]] * nodes[i] + self.mean[0];
                let x = Vector::from_vec(vec![xi]);
                let contribution = f(&x) * weights[i];
                result = Some(match result {
                        Some(acc) => acc + contribution,
                        None => contribution,
                });
            }
            return result.expect("p >= 1 guarantees at least one term");
        }

        let mut index = vec![0usize; self.dim];
        let mut result: Option<Matrix<Float>> = None;
        loop {
            let mut xi = Vector::<Float>::zeros(self.dim);
            let mut weight = 1.0;
            for (axis, &idx) in index.iter().enumerate() {
                xi[axis] = nodes[idx];
                weight *= weights[idx];
            }
            let x = self.cholesky_l.dot(&xi) + &self.mean;
            let contribution = f(&x) * weight;
            result = Some(match result {
                    Some(acc) => acc + contribution,
                    None => contribution,
            });

            if !increment_odometer(&mut index, p) {
                break;
            }
        }
        result.expect("p >= 1 guarantees at least one term")
    }
}

/// Increments a mixed-radix counter (radix `p` in every digit) in place,
/// rightmost digit fastest, matching row-major nested-loop order.
/// Returns `false` once the counter has wrapped back to all zeros.
fn increment_odometer(index: &mut [usize], p: usize) -> bool {
    for digit in index.iter_mut().rev() {
        *digit += 1;
        if *digit < p {
            return true;
        }
        *digit = 0;
    }
    false
}

fn check_dimension_cap(p: usize, dim: usize, max_cubature_points: usize) -> Result<(), GviError> {
    let total_points = (p as u64).saturating_pow(dim as u32);
    if total_points > max_cubature_points as u64 {
        return Err(GviError::CurseOfDimensionality(format!(
                    "{p}^{dim} = {total_points} cubature points exceeds the cap of {max_cubature_points}; \
                    split the problem into factored marginals"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn integrates_constant_function_to_itself() {
        let gh = GaussHermite::new(6, 2, Vector::zeros(2), &Matrix::eye(2), 10_000)
        .expect("identity covariance is PD");
        let result = gh.integrate(|_x| array![[2.0]]);
        assert_relative_eq!(result[[0, 0]], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn integrates_mean_of_linear_function_to_the_mean() {
        let mean = Vector::from_vec(vec![1.0, -2.0]);
        let gh =
        GaussHermite::new(6, 2, mean.clone(), &Matrix::eye(2), 10_000).expect("PD covariance");
        let result = gh.integrate(|x| array![[x[0]], [x[1]]]);
        assert_relative_eq!(result[[0, 0]], mean[0], epsilon = 1e-8);
        assert_relative_eq!(result[[1, 0]], mean[1], epsilon = 1e-8);
    }

    #[test]
    fn integrates_variance_of_univariate_gaussian_to_its_variance() {
        let cov: Matrix<Float> = array![[3.0]];
        let gh = GaussHermite::new(8, 1, Vector::zeros(1), &cov, 10_000).expect("PD covariance");
        let result = gh.integrate(|x| array![[x[0] * x[0]]]);
        assert_relative_eq!(result[[0, 0]], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_non_positive_definite_covariance() {
        let bad: Matrix<Float> = array![[1.0, 2.0], [2.0, 1.0]];
        let err = GaussHermite::new(4, 2, Vector::zeros(2), &bad, 10_000)
        .expect_err("indefinite covariance must fail");
        assert_eq!(err.code(), "not_positive_definite");
    }

    #[test]
    fn rejects_dimension_exceeding_cubature_point_cap() {
        let err = GaussHermite::new(6, 6, Vector::zeros(6), &Matrix::eye(6), 1_000)
        .expect_err("6^6 exceeds the cap of 1000");
        assert_eq!(err.code(), "curse_of_dimensionality");
    }

    #[test]
    fn set_degree_to_same_value_is_a_no_op() {
        let mut gh = GaussHermite::new(6, 1, Vector::zeros(1), &Matrix::eye(1), 10_000)
        .expect("PD covariance");
        gh.set_degree(6).expect("same degree always accepted");
        assert_eq!(gh.degree(), 6);
    }

    #[test]
    fn odometer_enumerates_every_combination_exactly_once() {
        let mut index = vec![0usize, 0usize];
        let mut seen = std::collections::HashSet::new();
        loop {
            seen.insert(index.clone());
            if !increment_odometer(&mut index, 3) {
                break;
            }
        }
        assert_eq!(seen.len(), 9);
    }
}
