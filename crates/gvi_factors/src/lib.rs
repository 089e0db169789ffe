//! The factor library: unary and binary potentials
//! over a factor's local marginal, each exposing the `cost`/`vmu`/`vmumu`
//! contract the optimizer accumulates into the joint gradient and
//! Hessian.
//!
//! `Factor` is dispatched dynamically in the style of
//! `factorgraph::factor::FactorKind` in `examples/AU-Master-Thesis-magics`,
//! generalized from GBP message-passing semantics to the GVI cubature
//! contract. A factor whose cost is quadratic in its local state
//! (`FixedPrior`, `GpPrior`) reports [`Factor::closed_form`] so the
//! optimizer can skip cubature entirely, per the linear-Gaussian fast
//! path in; a nonlinear factor (`ObstacleFactor`) returns
//! `None` and is integrated through [`gauss_hermite::GaussHermite`].

#![allow(clippy::module_name_repetitions)]

mod fixed_prior;
mod gp_prior;
mod obstacle;

pub use fixed_prior::FixedPrior;
pub use gauss_hermite::GaussHermite;
pub use gp_prior::GpPrior;
pub use obstacle::{DenseSdf, ObstacleFactor, Sdf};

use gvi_error::GviError;
use gvi_linalg::{cholesky::cholesky_inverse, Float, Matrix, NdarrayMatrixExt, Vector};
use trajectory::BlockLayout;

/// The closed-form variational partials of a quadratic (linear-Gaussian)
/// factor's cost `0.5 * (Hx - b)^T R^-1 (Hx - b)`, reduced to its
/// effective local precision `M = H^T R^-1 H` and information vector
/// `v = H^T R^-1 b`.
///
/// Because the cost is exactly quadratic, `E_q[∂cost/∂x] = M*μ - v` and
/// `E_q[∂²cost/∂x²] = M` hold with no dependence on the marginal
/// covariance, so no cubature is needed.
#[derive(Debug, Clone)]
pub struct LinearGaussianForm {
    /// `M = H^T R^-1 H`, the factor's contribution to the joint
    /// precision.
    pub precision: Matrix<Float>,
    /// `v = H^T R^-1 b`, the factor's contribution to the joint
    /// information vector.
    pub information: Vector<Float>,
    /// `0.5 * b^T R^-1 b`, the constant term of the expanded quadratic
    /// `0.5*(Hx-b)^T R^-1 (Hx-b)`, kept so [`Factor::cost`] reports the
    /// exact potential and not just its gradient-equivalent truncation.
    pub constant: Float,
}

impl LinearGaussianForm {
    /// Builds the closed form from a residual map `e(x) = H*x - b` with
    /// inverse-noise (precision) `r_inv`.
    #[must_use]
    pub fn from_residual(h: &Matrix<Float>, b: &Vector<Float>, r_inv: &Matrix<Float>) -> Self {
        let ht_rinv = h.t().dot(r_inv);
        let constant = 0.5 * b.dot(&r_inv.dot(b));
        Self { precision: ht_rinv.dot(h), information: ht_rinv.dot(b), constant }
    }

    /// `0.5*x^T M x - v^T x + constant`, the full quadratic cost.
    #[must_use]
    pub fn cost(&self, x: &Vector<Float>) -> Float {
        0.5 * x.dot(&self.precision.dot(x)) - self.information.dot(x) + self.constant
    }

    /// `V'_μ(μ) = M*μ - v`.
    #[must_use]
    pub fn gradient(&self, mean: &Vector<Float>) -> Vector<Float> {
        self.precision.dot(mean) - &self.information
    }

    /// `V''_μ = M`.
    #[must_use]
    pub fn hessian(&self) -> Matrix<Float> {
        self.precision.clone()
    }
}

/// A potential over a factor's local marginal `(μ_k, Σ_k)`.
///
/// Implementations own their [`BlockLayout`] (which joint indices they
/// read/write) but never the marginal itself: the optimizer derives
/// `(μ_k, Σ_k)` from the joint via [`gvi_gaussian::JointGaussian::refresh_marginals`]
/// each iteration and passes it in by reference, per the ownership rule
/// in ("per-factor local `(μ_k, Σ_k)` is derived, not
/// stored authoritatively").
pub trait Factor: std::fmt::Debug {
    /// The joint-index window this factor reads and writes.
    fn layout(&self) -> BlockLayout;

    /// The factor's negative-log-potential `cost(x)`, evaluated at a
    /// single point `x` in its local marginal's coordinates.
    fn cost(&self, x: &Vector<Float>) -> Float;

    /// Whether this factor's cost is exactly quadratic in `x`, i.e.
    /// whether [`Factor::closed_form`] is populated. Mirrors
    /// `IFactor::linear` in `factorgraph::factor::mod`.
    fn is_linear(&self) -> bool {
        self.closed_form().is_some()
    }

    /// The closed-form quadratic reduction of this factor's cost, if
    /// one exists. Populated by every linear-Gaussian factor
    /// (`FixedPrior`, `GpPrior`); `None` for factors that require
    /// cubature (`ObstacleFactor`).
    fn closed_form(&self) -> Option<LinearGaussianForm> {
        None
    }
}

/// The variational partials `(V'_μ, V''_μ)` a single factor contributes
/// to the joint gradient and Hessian, evaluated against its current
/// local marginal.
///
/// For a linear-Gaussian factor this reduces to
/// [`Factor::closed_form`]'s constant `(gradient, hessian)` pair with no
/// cubature at all. For a nonlinear factor, 's
/// closed-form expectation identities are used:
///
/// ```text
/// V'_μ = Λ_k · E_q[vmu]
/// V''_μ = Λ_k · E_q[vmumu] · Λ_k − Λ_k · E_q[cost]
/// ```
///
/// where `Λ_k = Σ_k^-1` is the factor's local precision, `vmu(x) =
/// (x-μ_k)·cost(x)`, and `vmumu(x) = (x-μ_k)(x-μ_k)^T·cost(x)`. The
/// result is symmetrized before being returned, guarding against the
/// asymmetric drift cubature can introduce.
///
/// # Errors
///
/// Returns [`GviError::InvalidCovariance`] if the local covariance
/// `marginal_covariance` is not positive definite, or
/// [`GviError::CurseOfDimensionality`] if the factor's dimension makes
/// cubature infeasible under `max_cubature_points`.
pub fn variational_partials(
    factor: &dyn Factor,
    marginal_mean: &Vector<Float>,
    marginal_covariance: &Matrix<Float>,
    gh_degree: usize,
    max_cubature_points: usize,
) -> Result<(Vector<Float>, Matrix<Float>), GviError> {
    if let Some(form) = factor.closed_form() {
        return Ok((form.gradient(marginal_mean), form.hessian()));
    }

    let dim = factor.layout().len;
    let local_precision = cholesky_inverse(marginal_covariance)?;
    let gh = GaussHermite::new(
        gh_degree,
        dim,
        marginal_mean.clone(),
        marginal_covariance,
        max_cubature_points,
    )?;

    let e_cost = gh.integrate(|x| Matrix::from_elem((1, 1), factor.cost(x)))[[0, 0]];
    let e_vmu = gh.integrate(|x| {
            let d = x - marginal_mean;
            (d * factor.cost(x)).insert_axis(ndarray::Axis(1))
    });
    let e_vmu = e_vmu.column(0).to_owned();
    let e_vmumu = gh.integrate(|x| {
            let d = x - marginal_mean;
            outer_product(&d, &d) * factor.cost(x)
    });

    let vmu = local_precision.dot(&e_vmu);
    let vmumu = local_precision.dot(&e_vmumu).dot(&local_precision) - &local_precision * e_cost;
    Ok((vmu, vmumu.symmetrized()))
}

fn outer_product(a: &Vector<Float>, b: &Vector<Float>) -> Matrix<Float> {
    let a_col = a.clone().insert_axis(ndarray::Axis(1));
    let b_row = b.clone().insert_axis(ndarray::Axis(0));
    a_col.dot(&b_row)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn outer_product_of_orthogonal_unit_vectors_is_zero() {
        let a = Vector::from_vec(vec![1.0, 0.0]);
        let b = Vector::from_vec(vec![0.0, 1.0]);
        let m = outer_product(&a, &b);
        assert_relative_eq!(m, array![[0.0, 1.0], [0.0, 0.0]]);
    }

    #[derive(Debug)]
    struct QuadraticProbe {
        layout: BlockLayout,
        form: LinearGaussianForm,
    }

    impl Factor for QuadraticProbe {
        fn layout(&self) -> BlockLayout {
            self.layout
        }

        fn cost(&self, x: &Vector<Float>) -> Float {
            0.5 * x.dot(&self.form.precision.dot(x)) - self.form.information.dot(x)
        }

        fn closed_form(&self) -> Option<LinearGaussianForm> {
            Some(self.form.clone())
        }
    }

    #[test]
    fn closed_form_factor_skips_cubature_and_matches_analytic_gradient() {
        let precision = Matrix::<Float>::eye(2) * 3.0;
        let information = Vector::from_vec(vec![1.0, -2.0]);
        let probe = QuadraticProbe {
            layout: BlockLayout::unary(0, 2),
            form: LinearGaussianForm {
                precision: precision.clone(),
                information: information.clone(),
                constant: 0.0,
            },
        };
        let mean = Vector::from_vec(vec![0.5, 0.5]);
        let cov = Matrix::<Float>::eye(2);
        let (grad, hess) = variational_partials(&probe, &mean, &cov, 6, 10_000).expect("closed form");
        assert_relative_eq!(grad, precision.dot(&mean) - &information, epsilon = 1e-12);
        assert_relative_eq!(hess, precision, epsilon = 1e-12);
    }

    #[derive(Debug)]
    struct NonlinearConstantCost {
        layout: BlockLayout,
        value: Float,
    }

    impl Factor for NonlinearConstantCost {
        fn layout(&self) -> BlockLayout {
            self.layout
        }

        fn cost(&self, _x: &Vector<Float>) -> Float {
            self.value
        }
    }

    #[test]
    fn constant_cost_factor_has_zero_gradient_and_scaled_precision_hessian() {
        // vmu(x) = (x-mu)*c integrates to 0 under a symmetric quadrature rule;
        // vmumu(x) = (x-mu)(x-mu)^T*c integrates to Sigma*c, so
        // V''_mu = Lambda*Sigma*c*Lambda - Lambda*c = Lambda*c - Lambda*c = 0.
        let probe = NonlinearConstantCost { layout: BlockLayout::unary(0, 2), value: 2.5 };
        let mean = Vector::from_vec(vec![1.0, -1.0]);
        let cov = Matrix::<Float>::eye(2) * 0.5;
        let (grad, hess) = variational_partials(&probe, &mean, &cov, 8, 10_000).expect("PD covariance");
        assert_relative_eq!(grad, Vector::zeros(2), epsilon = 1e-8);
        assert_relative_eq!(hess, Matrix::<Float>::zeros((2, 2)), epsilon = 1e-8);
    }
}
