//! The joint Gaussian data model: a mean vector and a
//! symmetric positive-definite precision matrix over `n = d * T` joint
//! dimensions, whose nonzero pattern is determined by the factor graph
//! (unary factors own a `d x d` diagonal block, binary GP factors own a
//! `2d x 2d` block straddling two adjacent states).
//!
//! This crate owns the *joint* representation; `gvi_factors` derives and
//! refreshes each factor's *marginal* `(μ_k, Σ_k)` from it every
//! iteration, per the lifecycle in ("per-factor local
//! `(μ_k, Σ_k)` is derived, not stored authoritatively").

use gvi_error::GviError;
use gvi_linalg::{Float, Matrix, NdarrayMatrixExt, Vector};
use trajectory::BlockLayout;

/// A factor's marginal, read out of the joint `(μ, Λ)` via the partial
/// inverse.
#[derive(Debug, Clone)]
pub struct Marginal {
    /// The factor's mean, `μ_k = P_k * μ`.
    pub mean: Vector<Float>,
    /// The factor's covariance, `Σ_k = P_k * Σ * P_k^T`.
    pub covariance: Matrix<Float>,
}

/// The joint Gaussian `(μ, Λ)` maintained by the GVI-GH optimizer.
///
/// Invariant 1/2: `precision` is symmetric and positive
/// definite at every value an accepted [`crate::JointGaussian`] is
/// observed in; a backtracking step that would violate this is rejected
/// by the optimizer before the joint is ever replaced (see
/// `gvi_optimizer`).
#[derive(Debug, Clone)]
pub struct JointGaussian {
    /// The joint mean `μ`, length `n`.
    pub mean: Vector<Float>,
    /// The joint precision `Λ`, `n x n`, symmetric positive definite.
    pub precision: Matrix<Float>,
}

impl JointGaussian {
    /// Builds a joint Gaussian directly from a mean and precision.
    #[must_use]
    pub fn new(mean: Vector<Float>, precision: Matrix<Float>) -> Self {
        Self { mean, precision }
    }

    /// Builds the initial joint from a user-supplied seed mean (typically
    /// linear interpolation of start/goal, "Lifecycle") and
    /// an isotropic precision `init_precision_factor * I`.
    #[must_use]
    pub fn from_seed(seed: Vector<Float>, init_precision_factor: Float) -> Self {
        let n = seed.len();
        Self { mean: seed, precision: Matrix::<Float>::eye(n) * init_precision_factor }
    }

    /// The joint dimension `n = d * T`.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// `max |Λ - Λ^T|`, expected to stay `<= 1e-10` after every accepted
    /// step.
    #[must_use]
    pub fn asymmetry(&self) -> Float {
        self.precision.asymmetry()
    }

    /// Replaces `precision` with its symmetrized average, guarding
    /// against floating-point drift accumulated by repeated scatter-adds.
    pub fn symmetrize(&mut self) {
        self.precision = self.precision.symmetrized();
    }

    /// `log det(Λ)`, read from the diagonal of its LDLᵀ factor, used by
    /// the optimizer's total free-energy evaluation
    /// `F(μ,Λ) = ... + 1/2 log det Λ`.
    ///
    /// # Errors
    ///
    /// Returns [`GviError::NotPositiveDefinite`] if `precision` is not
    /// positive definite (testable property 2).
    pub fn log_det_precision(&self) -> Result<Float, GviError> {
        let factors = trajectory::ldlt(&self.precision)?;
        let det = factors.determinant();
        if det <= 0.0 {
            return Err(GviError::NotPositiveDefinite(
                    "log det(precision) requires det(precision) > 0".to_string(),
            ));
        }
        Ok(det.ln())
    }

    /// Whether `precision` is positive definite, by attempting its LDLᵀ
    /// factorization (testable property 2).
    #[must_use]
    pub fn is_positive_definite(&self) -> bool {
        trajectory::ldlt(&self.precision).is_ok()
    }

    /// Refreshes every factor's marginal `(μ_k, Σ_k)` from the current
    /// joint, via one partial-inverse pass shared across all `layouts`.
    ///
    /// # Errors
    ///
    /// Returns [`GviError::NotPositiveDefinite`] if the joint precision's
    /// LDLᵀ factorization fails, which the optimizer treats as an
    /// aborted iteration that returns the last committed iterate.
    pub fn refresh_marginals(&self, layouts: &[BlockLayout]) -> Result<Vec<Marginal>, GviError> {
        let covariance_blocks = trajectory::partial_inverse(&self.precision, layouts)?;
        Ok(layouts
            .iter()
            .zip(covariance_blocks)
            .map(|(&layout, covariance)| Marginal {
                    mean: trajectory::extract_vector(&self.mean, layout),
                    covariance,
            })
            .collect())
    }
}
