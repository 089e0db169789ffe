//! Insertion/extraction of per-factor marginals into/from a joint,
//! block-structured Gaussian.
//!
//! The factor graph's sparsity pattern is block-tridiagonal-like: a
//! unary factor over state `i` owns the contiguous `d x d` block at
//! `[i*d, (i+1)*d)`, and a binary (GP) factor over `(i, i+1)` owns the
//! contiguous `2d x 2d` block at `[i*d, (i+2)*d)`. Because the natural
//! (time) ordering of states already makes every factor's index set
//! contiguous, each factor's block is addressed by a single
//! `(start, len)` pair rather than a general index list.

use gvi_linalg::{Float, Matrix, Vector};

/// The `(start, len)` window a factor owns within the joint vector /
/// matrix, grounded on `GVIFactorizedBase.h`'s `_block`/`_Pk` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// First joint index owned by this factor.
    pub start: usize,
    /// Number of contiguous joint indices owned by this factor.
    pub len: usize,
}

impl BlockLayout {
    /// The layout for a unary factor over state `state_index` of
    /// dimension `state_dim`.
    #[must_use]
    pub fn unary(state_index: usize, state_dim: usize) -> Self {
        Self { start: state_index * state_dim, len: state_dim }
    }

    /// The layout for a binary factor straddling `state_index` and
    /// `state_index + 1`, each of dimension `state_dim`.
    #[must_use]
    pub fn binary(state_index: usize, state_dim: usize) -> Self {
        Self { start: state_index * state_dim, len: 2 * state_dim }
    }

    fn range(self) -> std::ops::Range<usize> {
        self.start..(self.start + self.len)
    }
}

/// Reads the factor's marginal block out of a joint covariance/precision
/// matrix.
#[must_use]
pub fn extract_block(joint: &Matrix<Float>, layout: BlockLayout) -> Matrix<Float> {
    joint.slice(ndarray::s![layout.range(), layout.range()]).to_owned()
}

/// Reads the factor's marginal mean out of a joint mean vector.
#[must_use]
pub fn extract_vector(joint: &Vector<Float>, layout: BlockLayout) -> Vector<Float> {
    joint.slice(ndarray::s![layout.range()]).to_owned()
}

/// Adds `block` into the factor's window of `joint`, in place.
///
/// # Panics
///
/// Panics if `block`'s shape does not match `layout.len x layout.len`.
pub fn scatter_add(joint: &mut Matrix<Float>, layout: BlockLayout, block: &Matrix<Float>) {
    assert_eq!(block.nrows(), layout.len, "scatter_add block row count mismatch");
    assert_eq!(block.ncols(), layout.len, "scatter_add block col count mismatch");
    let mut window = joint.slice_mut(ndarray::s![layout.range(), layout.range()]);
    window += block;
}

/// Adds `v` into the factor's window of `joint`, in place.
///
/// # Panics
///
/// Panics if `v`'s length does not match `layout.len`.
pub fn scatter_add_vector(joint: &mut Vector<Float>, layout: BlockLayout, v: &Vector<Float>) {
    assert_eq!(v.len(), layout.len, "scatter_add_vector length mismatch");
    let mut window = joint.slice_mut(ndarray::s![layout.range()]);
    window += v;
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn unary_layout_is_one_state_wide() {
        let layout = BlockLayout::unary(2, 4);
        assert_eq!(layout.start, 8);
        assert_eq!(layout.len, 4);
    }

    #[test]
    fn binary_layout_spans_two_states() {
        let layout = BlockLayout::binary(2, 4);
        assert_eq!(layout.start, 8);
        assert_eq!(layout.len, 8);
    }

    #[test]
    fn extract_then_scatter_add_is_idempotent_on_zero() {
        // Testable property 4: scatter_add(Z, f, 0) == Z.
        let mut joint = Matrix::<Float>::eye(6);
        let before = joint.clone();
        let layout = BlockLayout::unary(1, 2);
        let zero = Matrix::<Float>::zeros((2, 2));
        scatter_add(&mut joint, layout, &zero);
        assert_relative_eq!(joint, before);
    }

    #[test]
    fn scatter_add_only_touches_its_own_window() {
        let mut joint = Matrix::<Float>::zeros((4, 4));
        let layout = BlockLayout::unary(1, 2);
        let block = array![[1.0, 2.0], [3.0, 4.0]];
        scatter_add(&mut joint, layout, &block);
        assert_relative_eq!(joint[[2, 2]], 1.0);
        assert_relative_eq!(joint[[2, 3]], 2.0);
        assert_relative_eq!(joint[[3, 2]], 3.0);
        assert_relative_eq!(joint[[3, 3]], 4.0);
        assert_relative_eq!(joint[[0, 0]], 0.0);
    }
}
