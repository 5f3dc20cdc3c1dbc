//! Error types for the pliant engine.
//!
//! All crates return `PliantResult<T>` from fallible operations. Nothing
//! in the numerical core swallows these: every variant reaches the caller
//! of the step that produced it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which solver loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverStage {
    /// The outer Newton iteration.
    Newton,
    /// The inner conjugate-gradient linear solve.
    ConjugateGradient,
}

impl std::fmt::Display for SolverStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Newton => f.write_str("Newton"),
            Self::ConjugateGradient => f.write_str("conjugate gradient"),
        }
    }
}

/// Unified error type for the pliant engine.
#[derive(Debug, Error)]
pub enum PliantError {
    /// Mesh data is malformed or inconsistent.
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Material parameter is out of valid range.
    #[error("Invalid material parameter: {0}")]
    InvalidMaterial(String),

    /// Configuration value is invalid (DOF counts, BC indices, scheme parameters).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A numerical failure such as a near-singular deformation gradient
    /// or a breakdown on an indefinite operator.
    #[error("Numerical failure: {0}")]
    Numerical(String),

    /// An iterative solver hit its iteration cap.
    #[error("{stage} solver did not converge after {iterations} iterations (residual: {residual:.2e})")]
    Convergence {
        stage: SolverStage,
        iterations: u32,
        residual: f64,
    },

    /// The Schur complement was asked to eliminate a block that is not SPD.
    #[error("Contact consistency violated: {0}")]
    ContactConsistency(String),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PliantError {
    /// Returns true for the two iteration-cap failures, which a caller may
    /// choose to answer by shrinking the time step.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, Self::Convergence { .. })
    }
}

/// Convenience alias for `Result<T, PliantError>`.
pub type PliantResult<T> = Result<T, PliantError>;
