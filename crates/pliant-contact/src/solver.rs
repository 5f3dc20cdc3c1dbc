//! Contact-space solver seam.
//!
//! The coupling layer reduces each step to a contact-space problem
//!
//! ```text
//! v_c = W γ + v_free,     γᵢ ∈ Coulomb cone,
//! 0 ≤ γᵢ,n  ⟂  v_c,i,n + φᵢ/dt ≥ 0
//! ```
//!
//! and hands it to a [`ContactSolver`]. Impulses and velocities are
//! expressed per pair in the contact frame `(t1, t2, n)`.

use faer::Mat;
use pliant_math::DVec3;
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// Contact-space problem handed to a [`ContactSolver`].
#[derive(Debug, Clone)]
pub struct ContactProblem {
    /// Delassus operator `W = J A⁻¹ Jᵀ` (3k × 3k).
    pub delassus: Mat<f64>,
    /// Contact velocity without contact impulses (3k).
    pub free_velocity: Vec<f64>,
    /// Normal bias `φᵢ / dt` per pair (k).
    pub bias: Vec<f64>,
    /// Coulomb friction coefficient per pair (k).
    pub friction: Vec<f64>,
}

impl ContactProblem {
    pub fn num_contacts(&self) -> usize {
        self.bias.len()
    }

    pub fn validate(&self) -> PliantResult<()> {
        let k = self.bias.len();
        if self.delassus.nrows() != 3 * k
            || self.delassus.ncols() != 3 * k
            || self.free_velocity.len() != 3 * k
            || self.friction.len() != k
        {
            return Err(PliantError::ContactConsistency(format!(
                "contact problem sizes disagree: W {}×{}, v_free {}, bias {}, friction {}",
                self.delassus.nrows(),
                self.delassus.ncols(),
                self.free_velocity.len(),
                k,
                self.friction.len()
            )));
        }
        if let Some(mu) = self.friction.iter().find(|mu| !(**mu >= 0.0)) {
            return Err(PliantError::InvalidConfig(format!(
                "friction coefficient must be non-negative, got {mu}"
            )));
        }
        Ok(())
    }

    /// Contact velocity `W γ + v_free` for the given impulses.
    pub fn contact_velocity(&self, impulses: &[DVec3]) -> Vec<f64> {
        let mut vc = self.free_velocity.clone();
        for (row, out) in vc.iter_mut().enumerate() {
            for (j, gamma) in impulses.iter().enumerate() {
                for c in 0..3 {
                    *out += self.delassus[(row, 3 * j + c)] * gamma[c];
                }
            }
        }
        vc
    }
}

/// Solver output: one contact-frame impulse per pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactImpulses {
    /// `(t1, t2, n)` impulse components per pair.
    pub impulses: Vec<DVec3>,
    /// Sweeps performed.
    pub iterations: u32,
    /// Largest impulse change in the final sweep.
    pub residual: f64,
}

impl ContactImpulses {
    /// Impulses flattened to `3k` entries.
    pub fn as_flat(&self) -> Vec<f64> {
        self.impulses.iter().flat_map(|g| g.to_array()).collect()
    }
}

/// Trait for contact-space solvers.
///
/// # Implementations
/// - `PgsContactSolver` — Projected Gauss–Seidel with Coulomb cones
pub trait ContactSolver: Send + Sync {
    /// Solves for the contact impulses of one step.
    fn solve(&self, problem: &ContactProblem) -> PliantResult<ContactImpulses>;

    /// Returns the solver name.
    fn name(&self) -> &str;
}

/// Projected Gauss–Seidel over pairs.
///
/// Each pair updates its normal row against the non-negativity bound,
/// then its two tangent rows, which are projected onto the friction
/// disk of radius `μ γ_n`. Rows whose diagonal vanishes (pairs on fully
/// prescribed vertices against kinematic geometry) keep a zero impulse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PgsContactSolver {
    pub max_iterations: u32,
    /// Absolute impulse change below which the sweep stops.
    pub tolerance: f64,
}

impl Default for PgsContactSolver {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

const MIN_DIAGONAL: f64 = 1e-14;

impl PgsContactSolver {
    pub fn new(max_iterations: u32, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    /// Row `row` of `W γ + v_free` (+ bias on normal rows).
    fn row_velocity(problem: &ContactProblem, gamma: &[f64], row: usize) -> f64 {
        let mut value = problem.free_velocity[row];
        for (col, g) in gamma.iter().enumerate() {
            value += problem.delassus[(row, col)] * g;
        }
        if row % 3 == 2 {
            value += problem.bias[row / 3];
        }
        value
    }
}

impl ContactSolver for PgsContactSolver {
    fn solve(&self, problem: &ContactProblem) -> PliantResult<ContactImpulses> {
        problem.validate()?;
        let k = problem.num_contacts();
        let mut gamma = vec![0.0; 3 * k];
        let mut iterations = 0;
        let mut residual = 0.0;

        while iterations < self.max_iterations {
            iterations += 1;
            residual = 0.0_f64;

            for i in 0..k {
                let old = [gamma[3 * i], gamma[3 * i + 1], gamma[3 * i + 2]];

                let n = 3 * i + 2;
                let w_nn = problem.delassus[(n, n)];
                if w_nn > MIN_DIAGONAL {
                    let vn = Self::row_velocity(problem, &gamma, n);
                    gamma[n] = (gamma[n] - vn / w_nn).max(0.0);
                } else {
                    gamma[n] = 0.0;
                }

                for t in [3 * i, 3 * i + 1] {
                    let w_tt = problem.delassus[(t, t)];
                    if w_tt > MIN_DIAGONAL {
                        let vt = Self::row_velocity(problem, &gamma, t);
                        gamma[t] -= vt / w_tt;
                    } else {
                        gamma[t] = 0.0;
                    }
                }

                let limit = problem.friction[i] * gamma[n];
                let tangential = (gamma[3 * i].powi(2) + gamma[3 * i + 1].powi(2)).sqrt();
                if tangential > limit {
                    let scale = if tangential > 0.0 { limit / tangential } else { 0.0 };
                    gamma[3 * i] *= scale;
                    gamma[3 * i + 1] *= scale;
                }

                for r in 0..3 {
                    residual = residual.max((gamma[3 * i + r] - old[r]).abs());
                }
            }

            if residual <= self.tolerance {
                break;
            }
        }

        if residual > self.tolerance {
            tracing::warn!(
                iterations,
                residual,
                "contact solver stopped at its sweep limit"
            );
        }

        Ok(ContactImpulses {
            impulses: gamma
                .chunks_exact(3)
                .map(|g| DVec3::new(g[0], g[1], g[2]))
                .collect(),
            iterations,
            residual,
        })
    }

    fn name(&self) -> &str {
        "projected_gauss_seidel"
    }
}
