//! Linear algebra primitives shared by every crate in the workspace:
//! matrix/vector type aliases, a small symmetric eigensolver, Cholesky
//! factorization, and a pretty-printer used by the CLI and by tests.

#![allow(clippy::module_name_repetitions)]

pub mod cholesky;
pub mod eig;
pub mod lu;
pub mod pretty_print;

use std::iter::Sum;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, NdFloat};

/// The floating point type used throughout the workspace.
pub type Float = f64;

/// A dense vector of `T`.
pub type Vector<T> = Array1<T>;
/// A dense matrix of `T`.
pub type Matrix<T> = Array2<T>;
/// A borrowed view of a [`Vector`].
pub type VectorView<'a, T> = ArrayView1<'a, T>;
/// A borrowed view of a [`Matrix`].
pub type MatrixView<'a, T> = ArrayView2<'a, T>;

/// Bound satisfied by every floating point type usable in this workspace.
pub trait GbpFloat: NdFloat + Copy + Sum {}
impl<T: NdFloat + Copy + Sum> GbpFloat for T {}

/// Extension methods for vector norms, mirroring the teacher's
/// `VectorNorm` trait but generalized over [`GbpFloat`].
pub trait VectorNorm<T> {
    /// The Euclidean (L2) norm.
    fn euclidean_norm(&self) -> T;
    /// The squared Euclidean norm, avoiding the final square root.
    fn squared_euclidean_norm(&self) -> T;
}

impl<T: GbpFloat> VectorNorm<T> for Vector<T> {
    fn euclidean_norm(&self) -> T {
        self.squared_euclidean_norm().sqrt()
    }

    fn squared_euclidean_norm(&self) -> T {
        self.iter().map(|&x| x * x).sum()
    }
}

impl<T: GbpFloat> VectorNorm<T> for VectorView<'_, T> {
    fn euclidean_norm(&self) -> T {
        self.squared_euclidean_norm().sqrt()
    }

    fn squared_euclidean_norm(&self) -> T {
        self.iter().map(|&x| x * x).sum()
    }
}

/// Extension methods used across the workspace for symmetrizing and
/// comparing matrices produced by iterative solvers.
pub trait NdarrayMatrixExt<T> {
    /// Returns `(self + self.t()) / 2`.
    fn symmetrized(&self) -> Matrix<T>;
    /// `max |self - self.t()|`, used to check invariant 1 from the spec
    /// (symmetry of the joint precision after every accepted step).
    fn asymmetry(&self) -> T;
}

impl<T: GbpFloat> NdarrayMatrixExt<T> for Matrix<T> {
    fn symmetrized(&self) -> Matrix<T> {
        (self + &self.t()) * T::from(0.5).expect("0.5 representable")
    }

    fn asymmetry(&self) -> T {
        let diff = self - &self.t();
        diff.iter().fold(T::zero(), |acc, &x| acc.max(x.abs()))
    }
}

/// Re-exports the types and traits most commonly needed by downstream
/// crates, mirroring the teacher's `prelude` module.
pub mod prelude {
    pub use super::{
        cholesky::{cholesky_inverse, cholesky_lower, cholesky_solve},
        eig::{pinv_symmetric, sqrtm, symmetric_eigen, tridiagonal_eigen},
        lu::{general_inverse, lu_solve},
        Float, GbpFloat, Matrix, MatrixView, NdarrayMatrixExt, Vector, VectorNorm, VectorView,
    };
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn euclidean_norm_matches_hand_computation() {
        let v: Vector<Float> = array![3.0, 4.0];
        assert_relative_eq!(v.euclidean_norm(), 5.0);
    }

    #[test]
    fn symmetrized_matrix_is_symmetric() {
        let m: Matrix<Float> = array![[1.0, 2.0], [0.0, 1.0]];
        let sym = m.symmetrized();
        assert_eq!(sym[[0, 1]], sym[[1, 0]]);
    }

    #[test]
    fn asymmetry_of_symmetric_matrix_is_zero() {
        let m: Matrix<Float> = array![[2.0, 1.0], [1.0, 2.0]];
        assert_relative_eq!(m.asymmetry(), 0.0);
    }

    #[test]
    fn arbtest_squared_norm_is_nonnegative() {
        arbtest::arbtest(|u| {
            let len = u.int_in_range(1..=8)?;
            let mut v = Vector::<Float>::zeros(len);
            for i in 0..len {
                v[i] = f64::from(u.int_in_range(-100..=100)?);
            }
            assert!(v.squared_euclidean_norm() >= 0.0);
            Ok(())
        });
    }
}
