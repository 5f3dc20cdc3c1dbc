//! Linear operator seam for iterative solvers.
//!
//! The conjugate-gradient solver only needs `y = A x`, so tangents can be
//! handed over either assembled ([`CsrMatrix`]) or as a closure that
//! applies the operator without ever forming it.

use crate::sparse::CsrMatrix;

/// A square linear map that can be applied to a vector.
pub trait LinearOperator {
    /// Dimension of the (square) operator.
    fn dimension(&self) -> usize;

    /// Computes `y = A x`. `y` is fully overwritten.
    fn apply(&self, x: &[f64], y: &mut [f64]);

    /// Main diagonal, when cheaply available. Used for Jacobi preconditioning.
    fn diagonal(&self) -> Option<Vec<f64>> {
        None
    }
}

impl LinearOperator for CsrMatrix {
    fn dimension(&self) -> usize {
        self.rows
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        self.mul_vec(x, y);
    }

    fn diagonal(&self) -> Option<Vec<f64>> {
        Some(CsrMatrix::diagonal(self))
    }
}

/// Operator defined only through its action on a vector.
pub struct MatrixFreeOperator<F>
where
    F: Fn(&[f64], &mut [f64]),
{
    dimension: usize,
    action: F,
}

impl<F> MatrixFreeOperator<F>
where
    F: Fn(&[f64], &mut [f64]),
{
    /// Wraps `action` as an operator of the given dimension.
    pub fn new(dimension: usize, action: F) -> Self {
        Self { dimension, action }
    }
}

impl<F> LinearOperator for MatrixFreeOperator<F>
where
    F: Fn(&[f64], &mut [f64]),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        (self.action)(x, y);
    }
}
