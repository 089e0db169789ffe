//! The proximal-gradient covariance steering outer loop from
//! §4.F: linearize the nonlinear dynamics/obstacle collaborators around
//! the current nominal `(z, Σ)`, blend with the current closed-loop
//! system via a proximal-point penalty, solve a linear covariance
//! steering subproblem at each iteration via [`linear_cs`], and push the
//! closed-loop system and the nominal trajectory forward.
//!
//! Grounded directly on `ProxGradCovSteer::optimize`/`step`/
//! `update_Qrk`/`solve_linearCS`/`propagate_mean` in
//! `examples/original_source/vimp/covariance_steering/ProximalGradientCovarianceSteering.h`.
//! The original's `step()` is a pure-virtual hook filled in per robot
//! model by a subclass that is not included in the retrieved source
//! (`PGCSLinDynRobotSDF.h` was filtered out); this crate generalizes that
//! hook into the [`DynamicsModel`] trait injected at construction, per
//! "external collaborators" boundary and §5's ownership
//! rule ("collaborators > optimizer > factors").

#![allow(clippy::module_name_repetitions)]

mod point_robot;

pub use point_robot::PointRobotDynamics;

use gvi_error::GviError;
use gvi_linalg::{eig::pinv_symmetric, Float, Matrix, NdarrayMatrixExt, Vector};
use gvi_recorder::{PgcsRecorder, PgcsSnapshot};
use linear_cs::{BoundaryMarginal, LinearCovarianceSteering};
use trajectory::Trajectory;

/// The per-timestep linearization step 2 asks the
/// external dynamics/obstacle collaborators for: `Â`, `â` are the
/// Jacobian and value of the (possibly nonlinear) dynamics `f(z, Σ)` at
/// a single timestep, `B` is the (possibly state-dependent) control
/// matrix at that timestep, and `state_cost_gradient` is `n_r`, the
/// obstacle-field cost gradient integrated against the current Gaussian
/// marginal at that timestep.
#[derive(Debug, Clone)]
pub struct Linearization {
    /// `Â`, the linearized closed-loop-free dynamics matrix.
    pub a_hat: Matrix<Float>,
    /// `B`, the control matrix at this timestep.
    pub b: Matrix<Float>,
    /// `â`, the linearized drift term.
    pub a_hat_drift: Vector<Float>,
    /// `n_r`, the obstacle-cost gradient expectation under the current
    /// marginal `N(z_i, Σ_i)`.
    pub state_cost_gradient: Vector<Float>,
}

/// The external dynamics/obstacle-cost collaborator asks
/// for `(Â, B, â, n_r)` at each timestep. Non-owning: the optimizer
/// consumes it through a `&dyn` reference, ownership
/// rule that collaborators outlive the optimizer.
pub trait DynamicsModel: std::fmt::Debug {
    /// The state dimension `nx`.
    fn nx(&self) -> usize;
    /// The control dimension `nu`.
    fn nu(&self) -> usize;

    /// Linearizes the dynamics and the obstacle cost around the nominal
    /// marginal `N(z, Σ)` at timestep `t`.
    ///
    /// # Errors
    ///
    /// Returns a [`GviError`] if the collaborator cannot linearize at
    /// this point (e.g. a degenerate marginal covariance for the
    /// cubature-integrated cost gradient).
    fn linearize(&self, z: &Vector<Float>, sigma: &Matrix<Float>, t: usize) -> Result<Linearization, GviError>;
}

/// Configuration for one [`PgcsSolver`] run, the PGCS subset of
/// flat configuration table.
#[derive(Debug, Clone)]
pub struct PgcsConfig {
    /// The proximal parameter `η`.
    pub eta: Float,
    /// The dynamics-noise coefficient `ε`.
    pub eps: Float,
    /// The planning horizon, `Δt = total_time / (nt - 1)`.
    pub total_time: Float,
    /// Stop when the closed-loop-system convergence metric drops below
    /// this.
    pub stop_err: Float,
    /// Outer-iteration cap.
    pub max_iter: usize,
    /// Eigenvalue truncation tolerance for the Moore-Penrose
    /// pseudoinverse of `BᵢBᵢᵀ`.
    pub pinv_tolerance: Float,
}

/// The outcome of one committed [`PgcsSolver::step`].
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    /// convergence metric: `‖A_{k+1}-A_k‖/‖A_k‖/T +
    /// ‖a_{k+1}-a_k‖/‖a_k‖/T`.
    pub error: Float,
}

/// The PGCS outer loop: owns the current closed-loop system `(A_k, B_k,
/// a_k)`, the nominal trajectory `(z_k, Σ_k)`, the fixed baseline
/// state-cost `Q`, the boundary marginals, and the recorder it emits one
/// [`PgcsSnapshot`] into per committed iteration.
#[derive(Debug)]
pub struct PgcsSolver<'a> {
    config: PgcsConfig,
    nx: usize,
    nu: usize,
    nt: usize,
    delta_t: Float,
    dynamics: &'a dyn DynamicsModel,
    state_matrix: Trajectory,
    input_matrix: Trajectory,
    drift: Trajectory,
    state_cost: Trajectory,
    z: Trajectory,
    sigma: Trajectory,
    start: BoundaryMarginal,
    goal: BoundaryMarginal,
    recorder: PgcsRecorder,
}

impl<'a> PgcsSolver<'a> {
    /// Builds a solver over `nt` instants spanning `config.total_time`,
    /// starting from an initial closed-loop guess `(a0, b0, drift0)`
    /// replicated across every timestep, a fixed baseline quadratic
    /// state cost `state_cost` (zero everywhere when the only state cost
    /// comes from the obstacle field via `dynamics`), and boundary
    /// marginals `start`/`goal`. Mirrors `ProxGradCovSteer`'s
    /// constructor: the nominal mean trajectory starts constant at
    /// `start.mean` (matching the original's `initialize_zk` being
    /// disabled in favor of a constant seed) and the nominal covariance
    /// trajectory starts constant at `start.covariance` except at the
    /// final timestep, which is pinned to `goal.covariance`.
    ///
    /// # Panics
    ///
    /// Panics if `nt < 2` or any argument's shape is inconsistent with
    /// `dynamics.nx()`/`dynamics.nu()`.
    #[must_use]
    pub fn new(
        dynamics: &'a dyn DynamicsModel,
        a0: Matrix<Float>,
        b0: Matrix<Float>,
        drift0: Vector<Float>,
        state_cost: Trajectory,
        start: BoundaryMarginal,
        goal: BoundaryMarginal,
        nt: usize,
        config: PgcsConfig,
    ) -> Self {
        let nx = dynamics.nx();
        let nu = dynamics.nu();
        assert!(nt >= 2, "pgcs needs at least two timesteps");
        assert_eq!(a0.shape(), [nx, nx], "A0 must be nx x nx");
        assert_eq!(b0.shape(), [nx, nu], "B0 must be nx x nu");
        assert_eq!(drift0.len(), nx, "drift0 must have dimension nx");
        assert_eq!(state_cost.shape(), (nx, nx), "state_cost must be nx x nx per timestep");
        assert_eq!(state_cost.len(), nt, "state_cost must have nt timesteps");
        assert_eq!(start.mean.len(), nx, "start mean must have dimension nx");
        assert_eq!(goal.mean.len(), nx, "goal mean must have dimension nx");

        let mut z = Trajectory::from_steps(vec![start.mean.clone().insert_axis(ndarray::Axis(1)); nt]);
        let mut sigma = Trajectory::from_steps(vec![start.covariance.clone(); nt]);
        sigma.compress(nt - 1, goal.covariance.clone());
        z.compress(nt - 1, goal.mean.clone().insert_axis(ndarray::Axis(1)));

        let delta_t = config.total_time / ((nt - 1) as Float);
        let recorder = PgcsRecorder::new(config.max_iter);

        Self {
            config,
            delta_t,
            nx,
            nu,
            nt,
            dynamics,
            state_matrix: Trajectory::from_steps(vec![a0; nt]),
            input_matrix: Trajectory::from_steps(vec![b0; nt]),
            drift: Trajectory::from_steps(vec![drift0.insert_axis(ndarray::Axis(1)); nt]),
            state_cost,
            z,
            sigma,
            start,
            goal,
            recorder,
        }
    }

    /// The nominal mean trajectory `z`, shape `(nx, 1, nt)`.
    #[must_use]
    pub fn mean_trajectory(&self) -> &Trajectory {
        &self.z
    }

    /// The nominal covariance trajectory `Σ`, shape `(nx, nx, nt)`.
    #[must_use]
    pub fn covariance_trajectory(&self) -> &Trajectory {
        &self.sigma
    }

    /// The current closed-loop dynamics matrix `A_k`, shape `(nx, nx,
    /// nt)`.
    #[must_use]
    pub fn state_matrix(&self) -> &Trajectory {
        &self.state_matrix
    }

    /// The current closed-loop drift `a_k`, shape `(nx, 1, nt)`.
    #[must_use]
    pub fn drift(&self) -> &Trajectory {
        &self.drift
    }

    /// The recorder accumulated so far.
    #[must_use]
    pub fn recorder(&self) -> &PgcsRecorder {
        &self.recorder
    }

    /// Runs iterations until `config.stop_err` is cleared or
    /// `config.max_iter` is reached, "Convergence".
    ///
    /// # Errors
    ///
    /// Propagates any [`GviError`] raised by the dynamics collaborator
    /// or by the linear covariance steering subsolver.
    pub fn run(&mut self) -> Result<usize, GviError> {
        let mut iterations_run = 0;
        for _ in 0..self.config.max_iter {
            let report = self.step()?;
            iterations_run += 1;
            if report.error < self.config.stop_err {
                tracing::info!(iteration = iterations_run, error = report.error, "PGCS converged");
                break;
            }
        }
        Ok(iterations_run)
    }

    /// Runs one outer iteration: propagate the nominal trajectory under
    /// the current closed loop, linearize around it, blend with a
    /// proximal penalty, solve the linear covariance steering
    /// subproblem, and update the closed loop. Per 's
    /// ordering: propagate uses the *previous* closed loop; linearize
    /// and the subsequent steps use the freshly propagated `(z, Σ)`.
    ///
    /// # Errors
    ///
    /// Propagates [`DynamicsModel::linearize`]'s and
    /// [`LinearCovarianceSteering::solve`]'s errors.
    pub fn step(&mut self) -> Result<StepReport, GviError> {
        self.propagate_mean_and_covariance();

        let mut a_hat = Trajectory::zeros(self.nx, self.nx, self.nt);
        let mut a_hat_drift = Trajectory::zeros(self.nx, 1, self.nt);
        let mut n_r = Trajectory::zeros(self.nx, 1, self.nt);
        let mut pinv_bbt = Trajectory::zeros(self.nx, self.nx, self.nt);
        for i in 0..self.nt {
            let z_i = self.z.extract(i).column(0).to_owned();
            let sigma_i = self.sigma.extract(i).clone();
            let linearization = self.dynamics.linearize(&z_i, &sigma_i, i)?;
            assert_eq!(linearization.a_hat.shape(), [self.nx, self.nx]);
            assert_eq!(linearization.b.shape(), [self.nx, self.nu]);

            let bbt = linearization.b.dot(&linearization.b.t());
            let pinv = pinv_symmetric(&bbt, self.config.pinv_tolerance)?;

            a_hat.compress(i, linearization.a_hat);
            a_hat_drift.compress(i, linearization.a_hat_drift.insert_axis(ndarray::Axis(1)));
            n_r.compress(i, linearization.state_cost_gradient.insert_axis(ndarray::Axis(1)));
            pinv_bbt.compress(i, pinv);
            self.input_matrix.compress(i, linearization.b);
        }

        let eta = self.config.eta;
        let scale1 = eta / (1.0 + eta);
        let scale2 = (eta / (1.0 + eta)).powi(2);

        let mut a_prior = Trajectory::zeros(self.nx, self.nx, self.nt);
        let mut drift_prior = Trajectory::zeros(self.nx, 1, self.nt);
        let mut q_k = Trajectory::zeros(self.nx, self.nx, self.nt);
        let mut r_k = Trajectory::zeros(self.nx, 1, self.nt);
        for i in 0..self.nt {
            let a_i = self.state_matrix.extract(i);
            let a_hat_i = a_hat.extract(i);
            let drift_i = self.drift.extract(i).column(0).to_owned();
            let a_hat_drift_i = a_hat_drift.extract(i).column(0).to_owned();

            let a_prior_i = a_i / (1.0 + eta) + a_hat_i * scale1;
            let drift_prior_i = &drift_i / (1.0 + eta) + &a_hat_drift_i * scale1;

            let q_i = self.state_cost.extract(i);
            let pinv_i = pinv_bbt.extract(i);
            let delta_a = a_i - a_hat_i;
            let nr_i = n_r.extract(i).column(0).to_owned();
            let z_i = self.z.extract(i).column(0).to_owned();

            let qk_i = q_i * (2.0 * scale1) + delta_a.t().dot(pinv_i).dot(&delta_a) * scale2;
            let rk_i = -(q_i.dot(&z_i)) * scale1 + &nr_i * (scale1 / 2.0)
            + delta_a.t().dot(pinv_i).dot(&(&drift_i - &a_hat_drift_i)) * scale2;

            a_prior.compress(i, a_prior_i.clone());
            drift_prior.compress(i, drift_prior_i.clone().insert_axis(ndarray::Axis(1)));
            q_k.compress(i, qk_i.symmetrized());
            r_k.compress(i, rk_i.insert_axis(ndarray::Axis(1)));
        }

        let problem = LinearCovarianceSteering::new(
            a_prior.clone(),
            self.input_matrix.clone(),
            drift_prior.clone(),
            q_k,
            r_k,
            self.start.clone(),
            self.goal.clone(),
            self.config.eps,
            self.config.total_time,
        );
        let solution = problem.solve()?;

        let previous_state_matrix = self.state_matrix.clone();
        let previous_drift = self.drift.clone();
        let mut next_state_matrix = Trajectory::zeros(self.nx, self.nx, self.nt);
        let mut next_drift = Trajectory::zeros(self.nx, 1, self.nt);
        for i in 0..self.nt {
            let b_i = self.input_matrix.extract(i);
            let k_i = solution.feedback_gain.extract(i);
            let d_i = solution.feedforward.extract(i).column(0).to_owned();
            let a_prior_i = a_prior.extract(i);
            let drift_prior_i = drift_prior.extract(i).column(0).to_owned();

            next_state_matrix.compress(i, a_prior_i + b_i.dot(k_i));
            next_drift.compress(i, (&drift_prior_i + b_i.dot(&d_i)).insert_axis(ndarray::Axis(1)));
        }

        let error = trajectory_relative_error(&previous_state_matrix, &next_state_matrix, self.nt)
        + trajectory_relative_error(&previous_drift, &next_drift, self.nt);

        self.state_matrix = next_state_matrix;
        self.drift = next_drift;

        self.recorder.push(PgcsSnapshot {
                feedback_gain: solution.feedback_gain,
                feedforward: solution.feedforward,
                mean_trajectory: self.z.clone(),
                covariance_trajectory: self.sigma.clone(),
        });

        Ok(StepReport { error })
    }

    fn propagate_mean_and_covariance(&mut self) {
        for i in 0..(self.nt - 1) {
            let z_i = self.z.extract(i).column(0).to_owned();
            let a_i = self.state_matrix.extract(i);
            let drift_i = self.drift.extract(i).column(0).to_owned();
            let b_i = self.input_matrix.extract(i);
            let sigma_i = self.sigma.extract(i);

            let z_next = &z_i + &((a_i.dot(&z_i) + &drift_i) * self.delta_t);
            let sigma_next = sigma_i
            + &((a_i.dot(sigma_i) + sigma_i.dot(&a_i.t()) + self.config.eps * b_i.dot(&b_i.t())) * self.delta_t);

            self.z.compress(i + 1, z_next.insert_axis(ndarray::Axis(1)));
            self.sigma.compress(i + 1, sigma_next);
        }
    }
}

/// `‖next - prev‖ / ‖prev‖ / nt`, the per-trajectory term of
/// §4.F's convergence metric (Frobenius norm summed across every
/// timestep's block).
fn trajectory_relative_error(prev: &Trajectory, next: &Trajectory, nt: usize) -> Float {
    let mut diff_sq = 0.0;
    let mut prev_sq = 0.0;
    for i in 0..prev.len() {
        let p = prev.extract(i);
        let n = next.extract(i);
        for (&pv, &nv) in p.iter().zip(n.iter()) {
            diff_sq += (nv - pv) * (nv - pv);
            prev_sq += pv * pv;
        }
    }
    let prev_norm = prev_sq.sqrt();
    if prev_norm < 1e-12 {
        return 0.0;
    }
    diff_sq.sqrt() / prev_norm / (nt as Float)
}
