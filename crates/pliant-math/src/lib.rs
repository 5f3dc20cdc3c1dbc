//! # pliant-math
//!
//! Linear algebra primitives for the pliant simulation engine.
//!
//! Provides:
//! - Re-exports of `glam` double-precision types (`DVec3`, `DMat3`)
//! - Polar decomposition and tetrahedral deformation gradients
//! - 9×9 tensors for constitutive tangents
//! - Sparse matrix representation (CSR) and sparse Cholesky via `faer`
//! - A matrix-free conjugate-gradient solver

pub mod cg;
pub mod decomposition;
pub mod faer_solver;
pub mod operator;
pub mod sparse;
pub mod tensor;

pub use cg::{CgConfig, CgStats, ConjugateGradient, Preconditioner};
pub use faer_solver::FaerSolver;
pub use operator::{LinearOperator, MatrixFreeOperator};
pub use sparse::{CsrMatrix, SparseSolver};
pub use tensor::Tensor9;

// Re-export glam types as the canonical math types for pliant.
pub use glam::{DMat3, DQuat, DVec3};
