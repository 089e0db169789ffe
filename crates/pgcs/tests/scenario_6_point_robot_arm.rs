//! Concrete scenario 6, generalized from the original
//! two-link planar arm to the point-robot [`PointRobotDynamics`] this
//! crate ships (robot kinematics/Jacobians are out of scope per
//! Non-goals): `nt=50`, `η=0.1`, `stop_err=1e-3`, checking
//! termination within 30 iterations and that the final mean trajectory
//! clears the obstacle by more than the hinge margin `eps`.

use std::sync::Arc;

use gvi_factors::{DenseSdf, Sdf};
use gvi_linalg::{Float, Matrix, Vector};
use linear_cs::BoundaryMarginal;
use pgcs::{DynamicsModel, IntegratorOrder, PgcsConfig, PgcsSolver, PointRobotDynamics};
use trajectory::Trajectory;

#[test]
fn point_robot_steers_around_the_obstacle_and_terminates_within_thirty_iterations() {
    let pos_dim = 2;
    let eps_sdf = 0.3;
    let sig_obs = 0.2;

    // A disc obstacle of radius 1.0 centered on the straight-line path
    // between start and goal.
    let field = Matrix::from_shape_fn((41, 41), |(row, col)| {
            let x = col as Float - 20.0;
            let y = row as Float - 20.0;
            (x * x + y * y).sqrt() - 10.0
    });
    let sdf: Arc<dyn Sdf> = Arc::new(DenseSdf::new(Vector::from_vec(vec![-10.0, -10.0]), 0.5, field));

    let dynamics = PointRobotDynamics::new(pos_dim, IntegratorOrder::Double, Arc::clone(&sdf), eps_sdf, sig_obs, 6, 10_000);
    let nx = dynamics.nx();
    let nu = dynamics.nu();
    let nt = 50;

    let start = BoundaryMarginal {
        mean: Vector::from_vec(vec![-5.0, 0.0, 0.0, 0.0]),
        covariance: Matrix::<Float>::eye(nx) * 1e-3,
    };
    let goal = BoundaryMarginal {
        mean: Vector::from_vec(vec![5.0, 0.0, 0.0, 0.0]),
        covariance: Matrix::<Float>::eye(nx) * 1e-3,
    };
    let state_cost = Trajectory::zeros(nx, nx, nt);

    let config = PgcsConfig { eta: 0.1, eps: 0.01, total_time: 5.0, stop_err: 1e-3, max_iter: 30, pinv_tolerance: 1e-9 };
    let mut solver = PgcsSolver::new(
        &dynamics,
        Matrix::<Float>::zeros((nx, nx)),
        Matrix::<Float>::zeros((nx, nu)),
        Vector::zeros(nx),
        state_cost,
        start,
        goal,
        nt,
        config,
    );

    let iterations = solver.run().expect("point-robot PGCS scenario should not error");
    assert!(iterations <= 30, "should terminate within the iteration cap, got {iterations}");

    let mean_trajectory = solver.mean_trajectory();
    let mut min_clearance = Float::MAX;
    for i in 0..nt {
        let z_i = mean_trajectory.extract(i).column(0).to_owned();
        let pos = z_i.slice(ndarray::s![0..pos_dim]).to_owned();
        min_clearance = min_clearance.min(sdf.distance(&pos));
    }
    assert!(
        min_clearance > eps_sdf - 1e-6,
        "final trajectory should clear the obstacle by more than the hinge margin, min_clearance={min_clearance}"
    );
}
