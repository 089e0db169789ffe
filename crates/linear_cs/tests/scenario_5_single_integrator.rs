//! Concrete scenario 5: a single-integrator steering
//! problem (`A=0`, `B=I`, zero state cost) over `nt=100` instants,
//! checking the boundary-match invariant (property 6) on both the mean
//! and the closed-loop-propagated covariance.

use gvi_linalg::{Float, Matrix, Vector};
use linear_cs::{BoundaryMarginal, LinearCovarianceSteering};
use trajectory::Trajectory;

#[test]
fn single_integrator_matches_prescribed_boundary_mean_and_covariance() {
    let nx = 2;
    let nu = 2;
    let nt = 100;
    let epsilon = 0.01;

    let a = Trajectory::zeros(nx, nx, nt);
    let b = Trajectory::from_steps(vec![Matrix::<Float>::eye(nu); nt]);
    let drift = Trajectory::zeros(nx, 1, nt);
    let q = Trajectory::zeros(nx, nx, nt);
    let r = Trajectory::zeros(nx, 1, nt);
    let start = BoundaryMarginal { mean: Vector::zeros(nx), covariance: Matrix::<Float>::eye(nx) };
    let goal = BoundaryMarginal {
        mean: Vector::from_vec(vec![1.0, 1.0]),
        covariance: Matrix::<Float>::eye(nx) * 0.1,
    };

    let problem = LinearCovarianceSteering::new(a, b.clone(), drift, q, r, start.clone(), goal.clone(), epsilon, 1.0);
    let solution = problem.solve().expect("single-integrator boundary-value problem is feasible");

    let x0 = solution.state_trajectory.extract(0).column(0).to_owned();
    let xt = solution.state_trajectory.extract(nt - 1).column(0).to_owned();
    for axis in 0..nx {
        assert!((x0[axis] - start.mean[axis]).abs() <= 1e-6, "x0[{axis}] = {}", x0[axis]);
        assert!((xt[axis] - goal.mean[axis]).abs() <= 1e-6, "xT[{axis}] = {}", xt[axis]);
    }

    // K is continuous in time: no timestep-to-timestep jump larger than a
    // handful of times the typical step-to-step change.
    let delta_t = problem.delta_t();
    let mut max_jump: Float = 0.0;
    let mut total_jump: Float = 0.0;
    for i in 0..(nt - 1) {
        let k_i = solution.feedback_gain.extract(i);
        let k_next = solution.feedback_gain.extract(i + 1);
        let jump = (k_next - k_i).iter().fold(0.0, |acc: Float, &x| acc.max(x.abs()));
        max_jump = max_jump.max(jump);
        total_jump += jump;
    }
    let mean_jump = total_jump / ((nt - 1) as Float);
    assert!(max_jump < 50.0 * mean_jump.max(1e-9), "K should vary smoothly in time, max_jump={max_jump}");
    let _ = delta_t;

    // Closed-loop covariance propagation ( §4.F step 1, applied
    // here to validate (E) in isolation): Sigma_{i+1} = Sigma_i +
    // dt*(A_cl*Sigma_i + Sigma_i*A_cl^T + eps*B*B^T), A_cl = A + B*K.
    let mut sigma = start.covariance.clone();
    for i in 0..(nt - 1) {
        let bi = b.extract(i);
        let ki = solution.feedback_gain.extract(i);
        let a_cl = bi.dot(ki);
        sigma = &sigma + &((a_cl.dot(&sigma) + sigma.dot(&a_cl.t()) + epsilon * bi.dot(&bi.t())) * delta_t);
    }

    for row in 0..nx {
        for col in 0..nx {
            assert!(
                (sigma[[row, col]] - goal.covariance[[row, col]]).abs() <= 1e-3,
                "Sigma_T[{row},{col}] = {}, expected {}",
                sigma[[row, col]],
                goal.covariance[[row, col]]
            );
        }
    }
}
