//! The closed-form linear covariance steering solver from
//! §4.E: given time-varying `(A, B, a, Q, r)` and boundary marginals
//! `(m0, Σ0)`, `(mT, ΣT)`, solves the steering boundary-value problem in
//! one forward pass and returns time-varying feedback `(K, d)`.
//!
//! Grounded directly on `LinearCovarianceSteering.h` in
//! `examples/original_source/` (`compute_M_Phi`/`solve`), reindexed from
//! Eigen's `Matrix3D`/`EigenWrapper::decompress3d` calls to
//! `trajectory::Trajectory`'s `extract`/`compress`. Unlike the original,
//! which caches the Hamiltonian blocks `M` and the transition matrix `Φ`
//! across calls and invalidates them from `update_params`, this crate
//! recomputes both inside every [`LinearCovarianceSteering::solve`] call:
//! `pgcs` calls `solve` once per outer iteration with genuinely new
//! `(A, B, a, Q, r)` each time, so there is nothing the original's cache
//! would actually save here.

#![allow(clippy::module_name_repetitions)]

use gvi_error::GviError;
use gvi_linalg::{
    cholesky::cholesky_inverse,
    eig::sqrtm,
    lu::{general_inverse, lu_solve},
    Float, Matrix, NdarrayMatrixExt, Vector,
};
use ndarray::{s, Axis};
use trajectory::Trajectory;

/// A prescribed boundary Gaussian marginal, `(m0, Σ0)` or `(mT, ΣT)` in
///
#[derive(Debug, Clone)]
pub struct BoundaryMarginal {
    /// The boundary mean.
    pub mean: Vector<Float>,
    /// The boundary covariance.
    pub covariance: Matrix<Float>,
}

/// The time-varying feedback law `(K, d)` plus the forward-rolled
/// state/costate trajectories used to check the boundary-match invariant
///.
#[derive(Debug, Clone)]
pub struct Solution {
    /// The feedback gain trajectory, shape `(nu, nx, nt)`.
    pub feedback_gain: Trajectory,
    /// The feedforward trajectory, shape `(nu, 1, nt)`.
    pub feedforward: Trajectory,
    /// The forward-rolled nominal state trajectory, shape `(nx, 1, nt)`.
    pub state_trajectory: Trajectory,
    /// The forward-rolled costate trajectory, shape `(nx, 1, nt)`.
    pub costate_trajectory: Trajectory,
}

/// A linear covariance steering problem instance: time-varying dynamics
/// `(A, B, a)`, a time-varying state cost `(Q, r)`, and two boundary
/// marginals, all sharing one uniform time grid of `nt` instants spaced
/// `Δt = total_time / (nt - 1)` apart.
#[derive(Debug, Clone)]
pub struct LinearCovarianceSteering {
    nx: usize,
    nu: usize,
    nt: usize,
    delta_t: Float,
    epsilon: Float,
    a: Trajectory,
    b: Trajectory,
    drift: Trajectory,
    q: Trajectory,
    r: Trajectory,
    start: BoundaryMarginal,
    goal: BoundaryMarginal,
}

impl LinearCovarianceSteering {
    /// Builds a steering problem over `nt` instants spaced `Δt =
    /// total_time / (nt - 1)` apart.
    ///
    /// # Panics
    ///
    /// Panics if the trajectories' shapes or lengths are inconsistent
    /// with `nx`, `nu`, or `nt` — a programmer error at construction
    /// sites internal to this workspace (`pgcs` and its tests), not a
    /// data-dependent runtime failure.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: Trajectory,
        b: Trajectory,
        drift: Trajectory,
        q: Trajectory,
        r: Trajectory,
        start: BoundaryMarginal,
        goal: BoundaryMarginal,
        epsilon: Float,
        total_time: Float,
    ) -> Self {
        let nt = a.len();
        assert!(nt >= 2, "a trajectory needs at least two timesteps");
        let (nx, nx2) = a.shape();
        assert_eq!(nx, nx2, "A must be square");
        let (bx, nu) = b.shape();
        assert_eq!(bx, nx, "B's row count must match the state dimension");
        assert_eq!(b.len(), nt, "B must share A's timestep count");
        assert_eq!(drift.shape(), (nx, 1), "a (drift) must be nx x 1");
        assert_eq!(drift.len(), nt, "a (drift) must share A's timestep count");
        assert_eq!(q.shape(), (nx, nx), "Q must be nx x nx");
        assert_eq!(q.len(), nt, "Q must share A's timestep count");
        assert_eq!(r.shape(), (nx, 1), "r must be nx x 1");
        assert_eq!(r.len(), nt, "r must share A's timestep count");
        assert_eq!(start.mean.len(), nx, "m0 must have dimension nx");
        assert_eq!(goal.mean.len(), nx, "mT must have dimension nx");

        Self {
            nx,
            nu,
            nt,
            delta_t: total_time / ((nt - 1) as Float),
            epsilon,
            a,
            b,
            drift,
            q,
            r,
            start,
            goal,
        }
    }

    /// Replaces the time-varying dynamics and state-cost coefficients,
    /// keeping the boundary marginals, `ε`, and the time grid fixed.
    /// Mirrors `LinearCovarianceSteering::update_params` in the original,
    /// the per-iteration re-linearization point `pgcs` calls every
    /// outer-loop iteration.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Self::new`].
    pub fn update_params(&mut self, a: Trajectory, b: Trajectory, drift: Trajectory, q: Trajectory, r: Trajectory) {
        assert_eq!(a.shape(), (self.nx, self.nx));
        assert_eq!(a.len(), self.nt);
        assert_eq!(b.shape(), (self.nx, self.nu));
        assert_eq!(drift.shape(), (self.nx, 1));
        assert_eq!(q.shape(), (self.nx, self.nx));
        assert_eq!(r.shape(), (self.nx, 1));
        self.a = a;
        self.b = b;
        self.drift = drift;
        self.q = q;
        self.r = r;
    }

    /// Number of support states `T` on the time grid.
    #[must_use]
    pub fn nt(&self) -> usize {
        self.nt
    }

    /// `Δt = total_time / (nt - 1)`.
    #[must_use]
    pub fn delta_t(&self) -> Float {
        self.delta_t
    }

    /// Solves the boundary-value problem: builds the Hamiltonian block
    /// `M`, propagates the transition matrix `Φ` by explicit Euler,
    /// solves for the mean trajectory and the costate initial condition,
    /// computes the boundary-matching `Π₀`, evolves the Riccati-like
    /// recursion, and returns the feedback `(K, d)`
    ///
    /// # Errors
    ///
    /// Returns [`GviError::BoundaryInfeasible`] if `Φ₁₂` is singular,
    /// either boundary covariance is not positive definite, or the
    /// boundary-matching square root `T` is not positive semi-definite.
    pub fn solve(&self) -> Result<Solution, GviError> {
        let nx = self.nx;
        let nu = self.nu;
        let nt = self.nt;
        let dt = self.delta_t;

        let mut m_traj = Trajectory::zeros(2 * nx, 2 * nx, nt);
        let mut zeta_traj = Trajectory::zeros(2 * nx, 1, nt);
        for i in 0..nt {
            let ai = self.a.extract(i);
            let bi = self.b.extract(i);
            let qi = self.q.extract(i);
            let drift_i = self.drift.extract(i).column(0).to_owned();
            let ri = self.r.extract(i).column(0).to_owned();

            let mut mi = Matrix::<Float>::zeros((2 * nx, 2 * nx));
            mi.slice_mut(s![0..nx, 0..nx]).assign(ai);
            mi.slice_mut(s![0..nx, nx..2 * nx]).assign(&(-bi.dot(&bi.t())));
            mi.slice_mut(s![nx..2 * nx, 0..nx]).assign(&(-qi));
            mi.slice_mut(s![nx..2 * nx, nx..2 * nx]).assign(&(-ai.t()));
            m_traj.compress(i, mi);

            let mut zeta_i = Vector::<Float>::zeros(2 * nx);
            zeta_i.slice_mut(s![0..nx]).assign(&drift_i);
            zeta_i.slice_mut(s![nx..2 * nx]).assign(&(-&ri));
            zeta_traj.compress(i, zeta_i.insert_axis(Axis(1)));
        }

        let mut phi = Matrix::<Float>::eye(2 * nx);
        for i in 0..(nt - 1) {
            let mi = m_traj.extract(i);
            phi = &phi + &(mi.dot(&phi) * dt);
        }
        let phi11 = phi.slice(s![0..nx, 0..nx]).to_owned();
        let phi12 = phi.slice(s![0..nx, nx..2 * nx]).to_owned();

        let mut s_particular = Vector::<Float>::zeros(2 * nx);
        for i in 0..(nt - 1) {
            let mi = m_traj.extract(i);
            let zeta_i = zeta_traj.extract(i).column(0).to_owned();
            s_particular = &s_particular + &((mi.dot(&s_particular) + &zeta_i) * dt);
        }
        let s_head = s_particular.slice(s![0..nx]).to_owned();

        let rhs = &self.goal.mean - &phi11.dot(&self.start.mean) - &s_head;
        let lambda0 = lu_solve(&phi12, &rhs).map_err(|e| boundary_err("Phi12 * lambda0 = rhs is unsolvable", e))?;

        let mut x0 = Vector::<Float>::zeros(2 * nx);
        x0.slice_mut(s![0..nx]).assign(&self.start.mean);
        x0.slice_mut(s![nx..2 * nx]).assign(&lambda0);

        let mut state_traj = Trajectory::zeros(nx, 1, nt);
        let mut costate_traj = Trajectory::zeros(nx, 1, nt);
        state_traj.compress(0, x0.slice(s![0..nx]).to_owned().insert_axis(Axis(1)));
        costate_traj.compress(0, x0.slice(s![nx..2 * nx]).to_owned().insert_axis(Axis(1)));

        let mut cur = x0;
        for i in 0..(nt - 1) {
            let mi = m_traj.extract(i);
            let zeta_i = zeta_traj.extract(i).column(0).to_owned();
            cur = &cur + &((mi.dot(&cur) + &zeta_i) * dt);
            state_traj.compress(i + 1, cur.slice(s![0..nx]).to_owned().insert_axis(Axis(1)));
            costate_traj.compress(i + 1, cur.slice(s![nx..2 * nx]).to_owned().insert_axis(Axis(1)));
        }

        let mut v_traj = Trajectory::zeros(nu, 1, nt);
        for i in 0..nt {
            let bi = self.b.extract(i);
            let lambda_i = costate_traj.extract(i).column(0).to_owned();
            let vi = -bi.t().dot(&lambda_i);
            v_traj.compress(i, vi.insert_axis(Axis(1)));
        }

        let sig0_inv =
        cholesky_inverse(&self.start.covariance).map_err(|e| boundary_err("Sigma0 is not positive definite", e))?;
        let sig0_inv_sqrt = sqrtm(&sig0_inv).map_err(|e| boundary_err("Sigma0^{-1/2} failed", e))?;
        let sig0_sqrt =
        sqrtm(&self.start.covariance).map_err(|e| boundary_err("Sigma0^{1/2} failed", e))?;
        let phi12_inv = general_inverse(&phi12).map_err(|e| boundary_err("Phi12 is singular", e))?;

        let temp = Matrix::<Float>::eye(nx) * (self.epsilon * self.epsilon / 4.0)
        + sig0_sqrt.dot(&phi12_inv).dot(&self.goal.covariance).dot(&phi12_inv.t()).dot(&sig0_sqrt);
        let t_sqrt = sqrtm(&temp).map_err(|e| boundary_err("boundary-matching square root T is not PSD", e))?;

        let pi0 = sig0_inv * (self.epsilon / 2.0) - phi12_inv.dot(&phi11) - sig0_inv_sqrt.dot(&t_sqrt).dot(&sig0_inv_sqrt);
        let pi0 = pi0.symmetrized();

        let mut pi_traj = Trajectory::zeros(nx, nx, nt);
        pi_traj.compress(0, pi0);
        for i in 0..(nt - 1) {
            let pi_i = pi_traj.extract(i).clone();
            let ai = self.a.extract(i);
            let bi = self.b.extract(i);
            let qi = self.q.extract(i);
            let pi_next =
            &pi_i - &((ai.t().dot(&pi_i) + pi_i.dot(ai) - pi_i.dot(bi).dot(&bi.t()).dot(&pi_i) + qi) * dt);
            pi_traj.compress(i + 1, pi_next);
        }

        let mut k_traj = Trajectory::zeros(nu, nx, nt);
        let mut d_traj = Trajectory::zeros(nu, 1, nt);
        for i in 0..nt {
            let bi = self.b.extract(i);
            let pi_i = pi_traj.extract(i);
            let xi = state_traj.extract(i).column(0).to_owned();
            let vi = v_traj.extract(i).column(0).to_owned();
            let bt_pi = bi.t().dot(pi_i);
            k_traj.compress(i, -&bt_pi);
            d_traj.compress(i, (&vi + &bt_pi.dot(&xi)).insert_axis(Axis(1)));
        }

        Ok(Solution {
                feedback_gain: k_traj,
                feedforward: d_traj,
                state_trajectory: state_traj,
                costate_trajectory: costate_traj,
        })
    }
}

fn boundary_err(context: &str, err: GviError) -> GviError {
    GviError::BoundaryInfeasible(format!("{context}: {err}"))
}
