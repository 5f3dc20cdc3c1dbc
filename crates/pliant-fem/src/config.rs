//! Solver configuration.
//!
//! Parameters that control the Newton loop, the inner conjugate-gradient
//! solve and the Newmark integrator.

use pliant_math::{CgConfig, Preconditioner};
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// Configuration for the Newton/CG equilibrium solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Absolute residual tolerance.
    pub abs_tolerance: f64,

    /// Relative residual tolerance. Newton stops once
    /// ‖r‖ ≤ abs_tolerance + rel_tolerance · ‖r₀‖.
    pub rel_tolerance: f64,

    /// Maximum Newton iterations per solve.
    pub max_newton_iterations: u32,

    /// Maximum CG iterations per linear solve.
    pub max_cg_iterations: u32,

    /// Relative tolerance of the CG solve.
    pub cg_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: 1e-8,
            rel_tolerance: 1e-6,
            max_newton_iterations: pliant_types::constants::DEFAULT_NEWTON_ITERATIONS,
            max_cg_iterations: pliant_types::constants::DEFAULT_CG_ITERATIONS,
            cg_tolerance: 1e-10,
        }
    }
}

impl SolverConfig {
    /// Creates a config for debugging (fewer iterations, looser tolerance).
    pub fn debug() -> Self {
        Self {
            rel_tolerance: 1e-3,
            max_newton_iterations: 5,
            max_cg_iterations: 500,
            cg_tolerance: 1e-6,
            ..Default::default()
        }
    }

    /// Creates a high-accuracy config (more iterations, tighter tolerance).
    pub fn high_accuracy() -> Self {
        Self {
            abs_tolerance: 1e-12,
            rel_tolerance: 1e-10,
            max_newton_iterations: 50,
            max_cg_iterations: 20_000,
            cg_tolerance: 1e-13,
        }
    }

    /// Checks that tolerances are non-negative and caps are non-zero.
    pub fn validate(&self) -> PliantResult<()> {
        if self.abs_tolerance < 0.0 || self.rel_tolerance < 0.0 || self.cg_tolerance <= 0.0 {
            return Err(PliantError::InvalidConfig(format!(
                "solver tolerances must be non-negative (abs {}, rel {}, cg {})",
                self.abs_tolerance, self.rel_tolerance, self.cg_tolerance
            )));
        }
        if self.max_newton_iterations == 0 || self.max_cg_iterations == 0 {
            return Err(PliantError::InvalidConfig(
                "iteration caps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// CG settings derived from this config (Jacobi preconditioned).
    pub fn cg_config(&self) -> CgConfig {
        CgConfig {
            max_iterations: self.max_cg_iterations,
            tolerance: self.cg_tolerance,
            preconditioner: Preconditioner::Jacobi,
        }
    }
}

/// Newmark-β parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewmarkParameters {
    pub beta: f64,
    pub gamma: f64,
}

impl Default for NewmarkParameters {
    /// Average-acceleration (trapezoidal) rule: β = ¼, γ = ½.
    fn default() -> Self {
        Self {
            beta: 0.25,
            gamma: 0.5,
        }
    }
}

impl NewmarkParameters {
    /// Validates β ∈ [0, ½] and γ ∈ [0, 1].
    pub fn validate(&self) -> PliantResult<()> {
        if !(0.0..=0.5).contains(&self.beta) {
            return Err(PliantError::InvalidConfig(format!(
                "Newmark beta must lie in [0, 0.5], got {}",
                self.beta
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(PliantError::InvalidConfig(format!(
                "Newmark gamma must lie in [0, 1], got {}",
                self.gamma
            )));
        }
        Ok(())
    }
}

/// Which quantity the nonlinear solve treats as its unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationScheme {
    /// Newmark with the next acceleration as unknown.
    AccelerationNewmark,
    /// Newmark with the next velocity as unknown.
    #[default]
    VelocityNewmark,
    /// Positions as unknown; velocities and accelerations are held.
    ZerothOrder,
}
