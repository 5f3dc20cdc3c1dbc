//! Conjugate Gradient solver for symmetric positive-definite systems.
//!
//! Solves `A x = b` using only products with `A` (see [`LinearOperator`]):
//!
//! ```text
//! r₀ = b − A x₀,  z₀ = M⁻¹ r₀,  p₀ = z₀
//! for k = 0, 1, 2, ...
//!    α_k = (r_k · z_k) / (p_k · A p_k)
//!    x_{k+1} = x_k + α_k p_k
//!    r_{k+1} = r_k − α_k A p_k
//!    z_{k+1} = M⁻¹ r_{k+1}
//!    β_k = (r_{k+1} · z_{k+1}) / (r_k · z_k)
//!    p_{k+1} = z_{k+1} + β_k p_k
//! ```
//!
//! In exact arithmetic the iteration terminates with the exact solution
//! of an n×n SPD system after at most n steps.

use pliant_types::{PliantError, PliantResult, SolverStage};
use serde::{Deserialize, Serialize};

use crate::operator::LinearOperator;

/// Preconditioner type for CG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preconditioner {
    /// No preconditioning.
    None,
    /// Jacobi (inverse diagonal). Falls back to `None` when the operator
    /// cannot provide its diagonal. Non-positive diagonal entries use 1 so
    /// the preconditioner stays positive definite.
    #[default]
    Jacobi,
}

/// Configuration for the conjugate-gradient solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CgConfig {
    /// Maximum number of CG iterations.
    pub max_iterations: u32,
    /// Iteration stops when ‖r‖ ≤ tolerance · ‖b‖.
    pub tolerance: f64,
    /// Preconditioner type.
    pub preconditioner: Preconditioner,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            max_iterations: pliant_types::constants::DEFAULT_CG_ITERATIONS,
            tolerance: 1e-10,
            preconditioner: Preconditioner::Jacobi,
        }
    }
}

/// Outcome of a successful CG solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgStats {
    /// Number of iterations performed.
    pub iterations: u32,
    /// Final (unpreconditioned) residual norm ‖b − A x‖.
    pub residual_norm: f64,
}

/// Conjugate gradient solver.
#[derive(Debug, Clone, Default)]
pub struct ConjugateGradient {
    config: CgConfig,
}

impl ConjugateGradient {
    /// Creates a solver with the given configuration.
    pub fn new(config: CgConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CgConfig {
        &self.config
    }

    /// Solves `A x = b`, using the incoming `x` as the initial guess.
    ///
    /// # Errors
    /// - `Numerical` if `pᵀ A p ≤ 0` (the operator is not SPD).
    /// - `Convergence { stage: ConjugateGradient, .. }` if the iteration
    ///   cap is reached.
    pub fn solve<A: LinearOperator + ?Sized>(
        &self,
        a: &A,
        b: &[f64],
        x: &mut [f64],
    ) -> PliantResult<CgStats> {
        let n = a.dimension();
        if b.len() != n || x.len() != n {
            return Err(PliantError::InvalidConfig(format!(
                "CG dimension mismatch: operator {n}, rhs {}, solution {}",
                b.len(),
                x.len()
            )));
        }

        let b_norm = norm(b);
        let threshold = self.config.tolerance * b_norm;
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(CgStats {
                iterations: 0,
                residual_norm: 0.0,
            });
        }

        let inv_diag = match self.config.preconditioner {
            Preconditioner::Jacobi => a.diagonal().map(|d| {
                d.into_iter()
                    .map(|v| if v > f64::MIN_POSITIVE { 1.0 / v } else { 1.0 })
                    .collect::<Vec<f64>>()
            }),
            Preconditioner::None => None,
        };
        let precondition = |r: &[f64], z: &mut [f64]| match &inv_diag {
            Some(d) => {
                for i in 0..r.len() {
                    z[i] = d[i] * r[i];
                }
            }
            None => z.copy_from_slice(r),
        };

        let mut r = vec![0.0; n];
        let mut ap = vec![0.0; n];
        a.apply(x, &mut ap);
        for i in 0..n {
            r[i] = b[i] - ap[i];
        }

        let mut residual_norm = norm(&r);
        if residual_norm <= threshold {
            return Ok(CgStats {
                iterations: 0,
                residual_norm,
            });
        }

        let mut z = vec![0.0; n];
        precondition(&r, &mut z);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        for iteration in 1..=self.config.max_iterations {
            a.apply(&p, &mut ap);
            let pap = dot(&p, &ap);
            if pap <= 0.0 || !pap.is_finite() {
                return Err(PliantError::Numerical(format!(
                    "conjugate gradient breakdown at iteration {iteration}: pᵀAp = {pap:.3e} (operator is not SPD)"
                )));
            }

            let alpha = rz / pap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }

            residual_norm = norm(&r);
            if residual_norm <= threshold {
                tracing::trace!(iteration, residual_norm, "cg converged");
                return Ok(CgStats {
                    iterations: iteration,
                    residual_norm,
                });
            }

            precondition(&r, &mut z);
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(PliantError::Convergence {
            stage: SolverStage::ConjugateGradient,
            iterations: self.config.max_iterations,
            residual: residual_norm,
        })
    }
}

/// Dot product of two equally sized slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
