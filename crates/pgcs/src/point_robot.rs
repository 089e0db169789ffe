//! A reference [`DynamicsModel`]: a linear single- or double-integrator
//! point robot navigating a signed-distance field, the same kind of
//! benchmark scenario `PGCSLinDynArmPlanarSDF.h` builds for the planar
//! arm in `examples/original_source/`, generalized here to a point robot
//! since robot kinematics/Jacobians are out of scope.
//!
//! The dynamics themselves are exactly linear (`Â = A`, `â = 0`); all of
//! the nonlinearity PGCS exists to linearize lives in the obstacle-cost
//! gradient `n_r`, computed by Gauss-Hermite cubature over the position
//! sub-block of the current marginal, following `update_Qrk`'s use of
//! `hinge_jacobian` in `ProximalGradientCovarianceSteering.h`.

use std::sync::Arc;

use gauss_hermite::GaussHermite;
use gvi_error::GviError;
use gvi_factors::Sdf;
use gvi_linalg::{Float, Matrix, Vector};

use crate::{DynamicsModel, Linearization};

/// The integrator order of a [`PointRobotDynamics`]: whether the state
/// is position alone or position-and-velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorOrder {
    /// State is position only; control is velocity.
    Single,
    /// State is `(position, velocity)`; control is acceleration.
    Double,
}

/// A linear point-robot [`DynamicsModel`] with an injected [`Sdf`]
/// obstacle collaborator, following split between the
/// dynamics Jacobian (trivial here, since the robot is linear) and the
/// obstacle-cost gradient (the genuinely nonlinear term PGCS
/// linearizes).
#[derive(Debug)]
pub struct PointRobotDynamics {
    pos_dim: usize,
    order: IntegratorOrder,
    a: Matrix<Float>,
    b: Matrix<Float>,
    sdf: Arc<dyn Sdf>,
    eps: Float,
    sig_obs: Float,
    gh_degree: usize,
    max_cubature_points: usize,
}

impl PointRobotDynamics {
    /// Builds a point-robot model over `pos_dim` spatial dimensions,
    /// with hinge margin `eps` and obstacle cost scale `sig_obs` (both
    /// matching [`gvi_factors::obstacle::ObstacleFactor`]'s contract),
    /// integrating the obstacle-cost gradient with a degree-`gh_degree`
    /// Gauss-Hermite rule capped at `max_cubature_points` nodes.
    #[must_use]
    pub fn new(
        pos_dim: usize,
        order: IntegratorOrder,
        sdf: Arc<dyn Sdf>,
        eps: Float,
        sig_obs: Float,
        gh_degree: usize,
        max_cubature_points: usize,
    ) -> Self {
        let (a, b) = match order {
            IntegratorOrder::Single => (Matrix::<Float>::zeros((pos_dim, pos_dim)), Matrix::<Float>::eye(pos_dim)),
            IntegratorOrder::Double => {
                let nx = 2 * pos_dim;
                let mut a = Matrix::<Float>::zeros((nx, nx));
                for d in 0..pos_dim {
                    a[[d, pos_dim + d]] = 1.0;
                }
                let mut b = Matrix::<Float>::zeros((nx, pos_dim));
                for d in 0..pos_dim {
                    b[[pos_dim + d, d]] = 1.0;
                }
                (a, b)
            }
        };
        Self { pos_dim, order, a, b, sdf, eps, sig_obs, gh_degree, max_cubature_points }
    }
}

impl DynamicsModel for PointRobotDynamics {
    fn nx(&self) -> usize {
        self.a.nrows()
    }

    fn nu(&self) -> usize {
        self.b.ncols()
    }

    fn linearize(&self, z: &Vector<Float>, sigma: &Matrix<Float>, _t: usize) -> Result<Linearization, GviError> {
        let nx = self.nx();
        let pos = z.slice(ndarray::s![0..self.pos_dim]).to_owned();
        let pos_cov = sigma.slice(ndarray::s![0..self.pos_dim, 0..self.pos_dim]).to_owned();

        let pos_gradient =
        expected_obstacle_gradient(&*self.sdf, self.eps, self.sig_obs, &pos, &pos_cov, self.gh_degree, self.max_cubature_points)?;

        let mut state_cost_gradient = Vector::<Float>::zeros(nx);
        state_cost_gradient.slice_mut(ndarray::s![0..self.pos_dim]).assign(&pos_gradient);
        let _ = self.order;

        Ok(Linearization {
                a_hat: self.a.clone(),
                b: self.b.clone(),
                a_hat_drift: Vector::zeros(nx),
                state_cost_gradient,
        })
    }
}

/// `E_{x ~ N(mean, cov)}[∇_x hinge(eps - sdf(x))² / sig_obs²]`, the
/// obstacle-cost gradient PGCS's `update_Qrk` linearizes around the
/// current marginal, following `ObstacleFactor::cost` in `gvi_factors`
/// but differentiated rather than merely evaluated (`cost_obstacle`'s
/// `Jacobian` output in `CostFunctions.h`), computed by cubature since
/// the hinge is not differentiable in closed form under expectation.
///
/// # Errors
///
/// Propagates [`GaussHermite::new`]'s errors (`not_positive_definite`,
/// `curse_of_dimensionality`).
pub fn expected_obstacle_gradient(
    sdf: &dyn Sdf,
    eps: Float,
    sig_obs: Float,
    mean: &Vector<Float>,
    cov: &Matrix<Float>,
    gh_degree: usize,
    max_cubature_points: usize,
) -> Result<Vector<Float>, GviError> {
    let dim = mean.len();
    let cubature = GaussHermite::new(gh_degree, dim, mean.clone(), cov, max_cubature_points)?;
    let scale = sig_obs * sig_obs;
    let result = cubature.integrate(|x| {
            let distance = sdf.distance(x);
            let err = eps - distance;
            if err <= 0.0 {
                Matrix::zeros((dim, 1))
            } else {
                let grad = sdf.gradient(x);
                (grad * (-2.0 * err / scale)).insert_axis(ndarray::Axis(1))
            }
    });
    Ok(result.column(0).to_owned())
}
