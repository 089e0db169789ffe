//! Fixed (boundary) prior: penalizes deviation of a single state from a
//! fixed target mean under a fixed precision, used to pin down the
//! trajectory's start and goal states.

use gvi_linalg::{Float, Matrix, Vector};
use trajectory::BlockLayout;

use crate::{Factor, LinearGaussianForm};

/// `cost(x) = ||x - target||²_{K0⁻¹}`, a unary quadratic factor anchoring
/// a single state to `target` under precision `k0_inv`.
#[derive(Debug, Clone)]
pub struct FixedPrior {
    layout: BlockLayout,
    form: LinearGaussianForm,
}

impl FixedPrior {
    /// Builds a boundary prior over the state at `state_index` (of
    /// dimension `state_dim`), anchored at `target` with precision
    /// `k0_inv`.
    ///
    /// # Panics
    ///
    /// Panics if `target`'s length does not match `state_dim` or
    /// `k0_inv`'s shape does not match `(state_dim, state_dim)`.
    #[must_use]
    pub fn new(state_index: usize, state_dim: usize, target: Vector<Float>, k0_inv: Matrix<Float>) -> Self {
        assert_eq!(target.len(), state_dim, "target dimension must match state_dim");
        assert_eq!(k0_inv.shape(), [state_dim, state_dim], "k0_inv must be state_dim x state_dim");
        let identity = Matrix::<Float>::eye(state_dim);
        Self {
            layout: BlockLayout::unary(state_index, state_dim),
            form: LinearGaussianForm::from_residual(&identity, &target, &k0_inv),
        }
    }
}

impl Factor for FixedPrior {
    fn layout(&self) -> BlockLayout {
        self.layout
    }

    fn cost(&self, x: &Vector<Float>) -> Float {
        self.form.cost(x)
    }

    fn closed_form(&self) -> Option<LinearGaussianForm> {
        Some(self.form.clone())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn gradient_vanishes_at_the_target_mean() {
        let target = Vector::from_vec(vec![1.0, 2.0]);
        let k0_inv = Matrix::<Float>::eye(2) * 100.0;
        let prior = FixedPrior::new(0, 2, target.clone(), k0_inv.clone());
        let form = prior.closed_form().expect("fixed prior is linear-Gaussian");
        assert_relative_eq!(form.gradient(&target), Vector::zeros(2), epsilon = 1e-10);
        assert_relative_eq!(form.hessian(), k0_inv, epsilon = 1e-10);
    }

    #[test]
    fn layout_is_a_single_state_window() {
        let prior = FixedPrior::new(3, 4, Vector::zeros(4), Matrix::<Float>::eye(4));
        assert_eq!(prior.layout().start, 12);
        assert_eq!(prior.layout().len, 4);
    }
}
