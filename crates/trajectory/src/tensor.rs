//! Time-varying matrix coefficients, represented as a stack of
//! per-timestep matrices: `A`, `B`, `a`, `Q`, `r`, `K`, `d`, `Σ`, `z` in
//! the linear covariance steering and PGCS components are all instances
//! of [`Trajectory`].

use gvi_linalg::{Float, Matrix};

/// A 3-D tensor of shape `(rows, cols, steps)`, stored as `steps`
/// per-timestep `rows x cols` matrices.
#[derive(Debug, Clone)]
pub struct Trajectory {
    rows: usize,
    cols: usize,
    steps: Vec<Matrix<Float>>,
}

impl Trajectory {
    /// Builds a trajectory of `steps` zero matrices, each `rows x cols`.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize, steps: usize) -> Self {
        Self { rows, cols, steps: vec![Matrix::zeros((rows, cols)); steps] }
    }

    /// Builds a trajectory from an explicit list of per-timestep
    /// matrices, which must all share the same shape.
    ///
    /// # Panics
    ///
    /// Panics if `matrices` is empty or the matrices do not share a
    /// common shape; both are programmer errors at construction sites
    /// internal to this workspace.
    #[must_use]
    pub fn from_steps(matrices: Vec<Matrix<Float>>) -> Self {
        let first = matrices.first().expect("trajectory must have at least one timestep");
        let (rows, cols) = (first.nrows(), first.ncols());
        assert!(
            matrices.iter().all(|m| m.nrows() == rows && m.ncols() == cols),
            "all timesteps of a trajectory must share one shape"
        );
        Self { rows, cols, steps: matrices }
    }

    /// Number of timesteps `T`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` if the trajectory has no timesteps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `(rows, cols)` shared by every timestep.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Reads the `r x c` matrix at timestep `i`.
    #[must_use]
    pub fn extract(&self, i: usize) -> &Matrix<Float> {
        &self.steps[i]
    }

    /// Overwrites the matrix at timestep `i`.
    ///
    /// # Panics
    ///
    /// Panics if `m`'s shape does not match the trajectory's shape.
    pub fn compress(&mut self, i: usize, m: Matrix<Float>) {
        assert_eq!((m.nrows(), m.ncols()), (self.rows, self.cols), "timestep shape mismatch");
        self.steps[i] = m;
    }

    /// Iterates the per-timestep matrices in time order.
    pub fn iter(&self) -> impl Iterator<Item = &Matrix<Float>> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn zeros_has_requested_shape_and_length() {
        let t = Trajectory::zeros(2, 3, 5);
        assert_eq!(t.len(), 5);
        assert_eq!(t.shape(), (2, 3));
    }

    #[test]
    fn compress_then_extract_round_trips() {
        let mut t = Trajectory::zeros(2, 2, 3);
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        t.compress(1, m.clone());
        assert_eq!(t.extract(1), &m);
        assert_eq!(t.extract(0), &Matrix::zeros((2, 2)));
    }

    #[test]
    #[should_panic(expected = "timestep shape mismatch")]
    fn compress_rejects_wrong_shape() {
        let mut t = Trajectory::zeros(2, 2, 1);
        t.compress(0, Matrix::zeros((3, 3)));
    }
}
