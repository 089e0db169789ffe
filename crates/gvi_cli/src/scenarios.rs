//! Builds the default point-robot scenario each engine runs when no
//! experiment-specific wiring is supplied: a planar trajectory between
//! `config.m0` and `config.m_t` around a single circular obstacle,
//! standing in for a two-link planar arm benchmark generalized here to
//! a point robot since kinematics/collision geometry beyond a point
//! mass are out of scope.
//!
//! The signed-distance field itself is synthesized in-process (a single
//! circular obstacle centered in the workspace) rather than read from
//! `config.sdf_file`: loading a real SDF grid file is one of the
//! external collaborators this workspace hands to other subsystems, so
//! the CLI's default scenario stands in with the simplest concrete
//! [`gvi_factors::Sdf`] that still exercises the obstacle factor.

use std::sync::Arc;

use gvi_config::Config;
use gvi_factors::{FixedPrior, GpPrior, ObstacleFactor, Sdf};
use gvi_gaussian::JointGaussian;
use gvi_linalg::{Float, Matrix, Vector};
use linear_cs::BoundaryMarginal;
use pgcs::{DynamicsModel, IntegratorOrder, PointRobotDynamics};

/// A single circular obstacle centered at the midpoint of `config.m0`
/// and `config.m_t`, with a radius chosen as a quarter of the straight-
/// line start-goal distance so the default scenario's trajectory
/// actually has to bend around it.
#[derive(Debug)]
pub struct CircularObstacle {
    center: Vector<Float>,
    radius: Float,
}

impl CircularObstacle {
    fn from_config(config: &Config) -> Self {
        let m0 = Vector::from_vec(config.m0.clone());
        let mt = Vector::from_vec(config.m_t.clone());
        let pos_dim = (config.nx / 2).min(m0.len()).min(mt.len()).max(1);
        let p0 = m0.slice(ndarray::s![0..pos_dim]).to_owned();
        let pt = mt.slice(ndarray::s![0..pos_dim]).to_owned();
        let center = (&p0 + &pt) / 2.0;
        let distance = (&pt - &p0).mapv(|v| v * v).sum().sqrt();
        let radius = (distance / 4.0).max(0.5);
        Self { center, radius }
    }
}

impl Sdf for CircularObstacle {
    fn distance(&self, point: &Vector<Float>) -> Float {
        let pos_dim = self.center.len();
        let p = point.slice(ndarray::s![0..pos_dim]).to_owned();
        (&p - &self.center).mapv(|v| v * v).sum().sqrt() - self.radius
    }

    fn gradient(&self, point: &Vector<Float>) -> Vector<Float> {
        let pos_dim = self.center.len();
        let p = point.slice(ndarray::s![0..pos_dim]).to_owned();
        let delta = &p - &self.center;
        let norm = delta.mapv(|v| v * v).sum().sqrt().max(1e-9);
        let mut grad = Vector::<Float>::zeros(point.len());
        grad.slice_mut(ndarray::s![0..pos_dim]).assign(&(delta / norm));
        grad
    }
}

/// The default GVI-GH scenario: a linearly interpolated seed trajectory
/// of `config.nt` `[position; velocity]` states between `config.m0` and
/// `config.m_t`, anchored by fixed priors at both ends, coupled by a
/// minimum-acceleration GP prior between every adjacent pair, and
/// penalized by one obstacle factor per state against a synthesized
/// [`CircularObstacle`].
pub fn build_gvi_gh_scenario(config: &Config) -> (JointGaussian, Vec<Box<dyn gvi_factors::Factor>>) {
    let pos_dim = config.nx / 2;
    let state_dim = config.nx;
    let nt = config.nt;
    let delta_t = config.total_time / ((nt - 1) as Float);

    let m0 = Vector::from_vec(config.m0.clone());
    let mt = Vector::from_vec(config.m_t.clone());

    let mut seed = Vector::<Float>::zeros(state_dim * nt);
    for i in 0..nt {
        let t = (i as Float) / ((nt - 1) as Float);
        let state = &m0 * (1.0 - t) + &mt * t;
        seed.slice_mut(ndarray::s![i * state_dim..(i + 1) * state_dim]).assign(&state);
    }
    let joint = JointGaussian::from_seed(seed, config.init_precision_factor);

    let sdf: Arc<dyn Sdf> = Arc::new(CircularObstacle::from_config(config));
    let k0_inv = Matrix::<Float>::eye(state_dim) * config.boundary_penalties;

    let mut factors: Vec<Box<dyn gvi_factors::Factor>> = Vec::new();
    factors.push(Box::new(FixedPrior::new(0, state_dim, m0, k0_inv.clone())));
    factors.push(Box::new(FixedPrior::new(nt - 1, state_dim, mt, k0_inv)));
    for i in 0..(nt - 1) {
        factors.push(Box::new(GpPrior::new(i, pos_dim, delta_t, config.coeff_qc)));
    }
    for i in 0..nt {
        factors.push(Box::new(ObstacleFactor::new(i, state_dim, Arc::clone(&sdf), config.eps_sdf, config.sig_obs)));
    }

    (joint, factors)
}

/// The default PGCS scenario: a double-integrator [`PointRobotDynamics`]
/// steering from `config.m0` to `config.m_t` around the same synthesized
/// [`CircularObstacle`], with boundary covariances `config.sig0 * I` and
/// `config.sig_t * I`.
pub fn build_pgcs_scenario(config: &Config) -> (PointRobotDynamics, BoundaryMarginal, BoundaryMarginal) {
    let pos_dim = config.nx / 2;
    let sdf: Arc<dyn Sdf> = Arc::new(CircularObstacle::from_config(config));
    let dynamics = PointRobotDynamics::new(
        pos_dim,
        IntegratorOrder::Double,
        sdf,
        config.eps_sdf,
        config.sig_obs,
        config.gh_degree,
        config.max_cubature_points,
    );

    let nx = 2 * pos_dim;
    let start = BoundaryMarginal {
        mean: Vector::from_vec(config.m0.clone()).slice(ndarray::s![0..nx]).to_owned(),
        covariance: Matrix::<Float>::eye(nx) * config.sig0,
    };
    let goal = BoundaryMarginal {
        mean: Vector::from_vec(config.m_t.clone()).slice(ndarray::s![0..nx]).to_owned(),
        covariance: Matrix::<Float>::eye(nx) * config.sig_t,
    };
    (dynamics, start, goal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gvi_gh_scenario_has_one_factor_per_state_plus_boundary_and_gp_priors() {
        let config = Config::default();
        let (joint, factors) = build_gvi_gh_scenario(&config);
        assert_eq!(joint.dim(), config.nx * config.nt);
        // 2 fixed priors + (nt-1) GP priors + nt obstacle factors.
        assert_eq!(factors.len(), 2 + (config.nt - 1) + config.nt);
    }

    #[test]
    fn pgcs_scenario_dynamics_dimension_matches_half_of_nx() {
        let config = Config::default();
        let (dynamics, start, goal) = build_pgcs_scenario(&config);
        assert_eq!(dynamics.nx(), config.nx);
        assert_eq!(start.mean.len(), config.nx);
        assert_eq!(goal.mean.len(), config.nx);
    }
}
