//! Obstacle factor: a hinge collision cost against a signed-distance
//! field, consumed by Gauss-Hermite cubature since it is nonlinear in
//! the robot's configuration.
//!
//! The signed-distance field is an external, immutable collaborator
//! →
//! signed distance and spatial gradient`") consumed here as a trait
//! object, not owned; the queried grid itself — loading a CSV/binary
//! map, bilinear interpolation, and the robot's body-sphere kinematics —
//! is out of scope for this crate.

use gvi_linalg::{Float, Matrix, Vector};
use trajectory::BlockLayout;

use crate::Factor;

/// A signed-distance field: negative inside obstacles, queried at a
/// robot configuration point. specifies this collaborator
/// as `sdf(x) → signed distance and spatial gradient`; the gradient
/// defaults to a central finite difference over [`Sdf::distance`] so
/// implementors only need to provide the distance lookup, but may
/// override it with an analytic gradient where one is cheap (e.g. a
/// pre-differentiated grid).
pub trait Sdf: std::fmt::Debug {
    /// The signed distance from `point` to the nearest obstacle
    /// boundary.
    fn distance(&self, point: &Vector<Float>) -> Float;

    /// The spatial gradient of [`Sdf::distance`] at `point`, by default a
    /// central finite difference with step `h = 1e-4`. Consumed by
    /// `pgcs`'s obstacle-cost linearization.
    fn gradient(&self, point: &Vector<Float>) -> Vector<Float> {
        const H: Float = 1e-4;
        let mut grad = Vector::<Float>::zeros(point.len());
        let mut probe = point.clone();
        for axis in 0..point.len() {
            probe[axis] = point[axis] + H;
            let plus = self.distance(&probe);
            probe[axis] = point[axis] - H;
            let minus = self.distance(&probe);
            probe[axis] = point[axis];
            grad[axis] = (plus - minus) / (2.0 * H);
        }
        grad
    }
}

/// A minimal dense reference [`Sdf`] over an axis-aligned grid of
/// pre-sampled distances, for tests and small standalone scenarios.
/// Production maps are loaded by the CLI, not by this crate.
#[derive(Debug, Clone)]
pub struct DenseSdf {
    origin: Vector<Float>,
    cell_size: Float,
    field: Matrix<Float>,
}

impl DenseSdf {
    /// Builds a dense SDF from a pre-sampled `field`, whose cell `(i,j)`
    /// holds the distance at `origin + cell_size*(j, i)` (row-major,
    /// matching the "bottom-left is origin" convention used by the
    /// planar point-robot benchmark maps).
    #[must_use]
    pub fn new(origin: Vector<Float>, cell_size: Float, field: Matrix<Float>) -> Self {
        Self { origin, cell_size, field }
    }

    fn bilinear(&self, point: &Vector<Float>) -> Float {
        let gx = (point[0] - self.origin[0]) / self.cell_size;
        let gy = (point[1] - self.origin[1]) / self.cell_size;
        let (rows, cols) = (self.field.nrows(), self.field.ncols());
        let x0 = (gx.floor() as isize).clamp(0, cols as isize - 1) as usize;
        let y0 = (gy.floor() as isize).clamp(0, rows as isize - 1) as usize;
        let x1 = (x0 + 1).min(cols - 1);
        let y1 = (y0 + 1).min(rows - 1);
        let tx = (gx - x0 as Float).clamp(0.0, 1.0);
        let ty = (gy - y0 as Float).clamp(0.0, 1.0);

        let f00 = self.field[[y0, x0]];
        let f10 = self.field[[y0, x1]];
        let f01 = self.field[[y1, x0]];
        let f11 = self.field[[y1, x1]];
        let top = f00 * (1.0 - tx) + f10 * tx;
        let bottom = f01 * (1.0 - tx) + f11 * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

impl Sdf for DenseSdf {
    fn distance(&self, point: &Vector<Float>) -> Float {
        self.bilinear(point)
    }
}

/// Collision cost against a signed-distance field: `cost(x) =
/// vec_err^T (I/σ_obs²) vec_err`, `vec_err = hinge(eps - sdf(conf))`,
/// `hinge(v) = max(0, v)`, following `cost_obstacle_planar` in
/// `CostFunctions.h` (an identity precision scaled by the inverse noise
/// std, generalized here to the spec's `1/σ_obs²` scale).
#[derive(Debug)]
pub struct ObstacleFactor {
    layout: BlockLayout,
    sdf: std::sync::Arc<dyn Sdf>,
    eps: Float,
    sig_obs: Float,
}

impl ObstacleFactor {
    /// Builds an obstacle factor over the state at `state_index` (of
    /// dimension `state_dim`, the robot's configuration-space point),
    /// with hinge margin `eps` and cost scale `sig_obs`.
    #[must_use]
    pub fn new(
        state_index: usize,
        state_dim: usize,
        sdf: std::sync::Arc<dyn Sdf>,
        eps: Float,
        sig_obs: Float,
    ) -> Self {
        Self { layout: BlockLayout::unary(state_index, state_dim), sdf, eps, sig_obs }
    }
}

impl Factor for ObstacleFactor {
    fn layout(&self) -> BlockLayout {
        self.layout
    }

    fn cost(&self, x: &Vector<Float>) -> Float {
        let distance = self.sdf.distance(x);
        let err = (self.eps - distance).max(0.0);
        err * err / (self.sig_obs * self.sig_obs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn cost_is_zero_outside_the_hinge_margin() {
        let sdf: Arc<dyn Sdf> = Arc::new(DenseSdf::new(
                Vector::zeros(2),
                1.0,
                Matrix::from_elem((3, 3), 10.0),
        ));
        let factor = ObstacleFactor::new(0, 2, sdf, 4.0, 0.5);
        assert_relative_eq!(factor.cost(&array![1.0, 1.0]), 0.0);
    }

    #[test]
    fn cost_scales_with_squared_penetration_inside_the_margin() {
        // Constant SDF of 0.0 everywhere: err = eps - 0 = eps = 2.0.
        let sdf: Arc<dyn Sdf> =
        Arc::new(DenseSdf::new(Vector::zeros(2), 1.0, Matrix::zeros((3, 3))));
        let factor = ObstacleFactor::new(0, 2, sdf, 2.0, 0.5);
        let expected = 2.0_f64 * 2.0 / (0.5 * 0.5);
        assert_relative_eq!(factor.cost(&array![1.0, 1.0]), expected, epsilon = 1e-10);
    }

    #[test]
    fn is_not_linear() {
        let sdf: Arc<dyn Sdf> = Arc::new(DenseSdf::new(Vector::zeros(2), 1.0, Matrix::zeros((3, 3))));
        let factor = ObstacleFactor::new(0, 2, sdf, 2.0, 0.5);
        assert!(!factor.is_linear());
        assert!(factor.closed_form().is_none());
    }

    #[test]
    fn gradient_default_matches_linear_field_slope() {
        // field(x,y) = x, sampled on a fine grid: d/dx = 1, d/dy = 0.
        let field = Matrix::from_shape_fn((5, 5), |(_row, col)| col as Float);
        let sdf = DenseSdf::new(Vector::zeros(2), 1.0, field);
        let grad = sdf.gradient(&array![2.0, 2.0]);
        assert_relative_eq!(grad[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(grad[1], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn bilinear_interpolation_reproduces_grid_corner_values() {
        let field = array![[1.0, 2.0], [3.0, 4.0]];
        let sdf = DenseSdf::new(Vector::zeros(2), 1.0, field);
        assert_relative_eq!(sdf.distance(&array![0.0, 0.0]), 1.0, epsilon = 1e-10);
        assert_relative_eq!(sdf.distance(&array![1.0, 1.0]), 4.0, epsilon = 1e-10);
    }
}
