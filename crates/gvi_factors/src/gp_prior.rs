//! Minimum-acceleration Gaussian-process prior: couples two consecutive
//! states `(xᵢ, xᵢ₊₁)` via a continuous-time white-noise-acceleration
//! process model, following `DynamicFactor::new` in
//! `factorgraph/factor/dynamic.rs` generalized from a fixed
//! constant-velocity DOF count to a configured position dimension
//! `pos_dim`.

use ndarray::{concatenate, Axis};
use gvi_linalg::{Float, Matrix, Vector};
use trajectory::BlockLayout;

use crate::{Factor, LinearGaussianForm};

/// The GP prior over two consecutive `[position; velocity]` states.
///
/// The residual is the constant-velocity model's state transition error
/// `e = H*[xᵢ; vᵢ; xᵢ₊₁; vᵢ₊₁]`, with
/// `H = [[I, Δt·I, -I, 0], [0, I, 0, -I]]`, zero-mean (`b = 0`), under
/// the precision `Qc⁻¹`-derived noise model below. The factor is exactly
/// quadratic, so it always reports a [`crate::LinearGaussianForm`].
#[derive(Debug, Clone)]
pub struct GpPrior {
    layout: BlockLayout,
    form: LinearGaussianForm,
}

impl GpPrior {
    /// Builds the GP prior coupling state `state_index` and
    /// `state_index + 1`, each of position dimension `pos_dim`, spaced
    /// `delta_t` apart, under white-noise-acceleration spectral density
    /// `qc` (isotropic, one scalar per position DOF).
    ///
    /// # Panics
    ///
    /// Panics if `delta_t` or `qc` is not strictly positive.
    #[must_use]
    pub fn new(state_index: usize, pos_dim: usize, delta_t: Float, qc: Float) -> Self {
        assert!(delta_t > 0.0, "delta_t must be positive");
        assert!(qc > 0.0, "qc must be positive");

        let eye = Matrix::<Float>::eye(pos_dim);
        let zeros = Matrix::<Float>::zeros((pos_dim, pos_dim));
        let qc_inv = (1.0 / qc) * &eye;

        // Closed-form inverse of the minimum-acceleration GP prior's
        // continuous-time covariance, per `dynamic.rs`'s `qi_inv`.
        let qi_inv = concatenate![
            Axis(0),
            concatenate![Axis(1), 12.0 * delta_t.powi(-3) * &qc_inv, -6.0 * delta_t.powi(-2) * &qc_inv],
            concatenate![Axis(1), -6.0 * delta_t.powi(-2) * &qc_inv, (4.0 / delta_t) * &qc_inv]
        ];

        let h = concatenate![
            Axis(0),
            concatenate![Axis(1), eye.clone(), delta_t * &eye, -1.0 * &eye, zeros.clone()],
            concatenate![Axis(1), zeros.clone(), eye, zeros.clone(), -1.0 * &eye]
        ];

        let joint_dim = 2 * pos_dim;
        let form = LinearGaussianForm::from_residual(&h, &Vector::zeros(joint_dim), &qi_inv);
        Self { layout: BlockLayout::binary(state_index, 2 * pos_dim), form }
    }
}

impl Factor for GpPrior {
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
