//! Newton–Raphson equilibrium solver with a conjugate-gradient inner solve.
//!
//! Each iteration:
//! 1. **Residual** — `r(z)` from the model (dynamic or quasistatic)
//! 2. **Check** — stop once `‖r‖ ≤ abs_tol + rel_tol · ‖r₀‖`
//! 3. **Linear solve** — `tangent · Δz = −r` with Jacobi-preconditioned CG
//!    on the matrix-free tangent
//! 4. **Update** — apply `Δz` through the state updater
//!
//! The solve runs on a copy of the caller's state; a failure never leaves
//! the caller with a partially updated state.

use std::time::Instant;

use pliant_math::cg::norm;
use pliant_math::ConjugateGradient;
use pliant_types::{PliantError, PliantResult, SolverStage};
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::model::FemModel;
use crate::state::FemState;
use crate::state_updater::{StateUpdater, WeightedSum};

/// Outcome of a converged solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    /// Newton iterations performed.
    pub newton_iterations: u32,
    /// CG iterations summed over all Newton iterations.
    pub cg_iterations: u32,
    /// ‖r₀‖.
    pub initial_residual: f64,
    /// ‖r‖ at exit.
    pub final_residual: f64,
    /// Wall-clock time (seconds).
    pub wall_time: f64,
}

/// Newton/CG solver bound to one model and one integration scheme.
#[derive(Debug, Clone)]
pub struct FemSolver {
    model: FemModel,
    updater: StateUpdater,
    config: SolverConfig,
}

#[derive(Clone, Copy)]
enum Mode {
    Dynamic,
    Quasistatic,
}

impl FemSolver {
    /// Creates a solver after validating the updater and config.
    pub fn new(model: FemModel, updater: StateUpdater, config: SolverConfig) -> PliantResult<Self> {
        updater.validate()?;
        config.validate()?;
        Ok(Self {
            model,
            updater,
            config,
        })
    }

    pub fn model(&self) -> &FemModel {
        &self.model
    }

    /// Mutable access for loads and boundary conditions between steps.
    pub fn model_mut(&mut self) -> &mut FemModel {
        &mut self.model
    }

    pub fn state_updater(&self) -> &StateUpdater {
        &self.updater
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Advances `prev` by `dt` and returns the converged state at n+1.
    ///
    /// # Errors
    /// - `InvalidConfig` if `dt ≤ 0`.
    /// - `Convergence` if Newton or CG hits its cap.
    /// - `Numerical` on CG breakdown or a singular element.
    pub fn advance_one_time_step(
        &self,
        prev: &FemState,
        dt: f64,
    ) -> PliantResult<(FemState, SolverStats)> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(PliantError::InvalidConfig(format!(
                "time step must be positive, got {dt}"
            )));
        }
        let mut state = self.updater.advance_one_time_step(prev, dt);
        self.model.apply_boundary_condition(&mut state);
        // Zeroth order holds v and a, so inertia and damping drop out.
        let mode = match self.updater {
            StateUpdater::ZerothOrder => Mode::Quasistatic,
            _ => Mode::Dynamic,
        };
        let stats = self.newton(&mut state, dt, mode)?;
        Ok((state, stats))
    }

    /// Solves for static equilibrium `f_int(q) = f_ext`, starting from
    /// `initial`. Velocities and accelerations are carried unchanged.
    pub fn solve_static(&self, initial: &FemState) -> PliantResult<(FemState, SolverStats)> {
        let mut state = initial.clone();
        self.model.apply_boundary_condition(&mut state);
        let stats = self.newton(&mut state, 1.0, Mode::Quasistatic)?;
        Ok((state, stats))
    }

    fn residual(&self, state: &mut FemState, mode: Mode) -> PliantResult<Vec<f64>> {
        match mode {
            Mode::Dynamic => self.model.calc_residual(state),
            Mode::Quasistatic => self.model.calc_static_residual(state),
        }
    }

    fn newton(&self, state: &mut FemState, dt: f64, mode: Mode) -> PliantResult<SolverStats> {
        let start = Instant::now();
        let (updater, weights) = match mode {
            Mode::Dynamic => (self.updater, self.updater.weights(dt)),
            Mode::Quasistatic => (StateUpdater::ZerothOrder, WeightedSum::STATIC),
        };
        let cg = ConjugateGradient::new(self.config.cg_config());

        let mut residual = self.residual(state, mode)?;
        let initial_residual = norm(&residual);
        let threshold = self.config.abs_tolerance + self.config.rel_tolerance * initial_residual;
        let mut residual_norm = initial_residual;
        let mut cg_iterations = 0;

        for iteration in 0..=self.config.max_newton_iterations {
            tracing::debug!(iteration, residual = residual_norm, "newton iteration");
            if residual_norm <= threshold {
                return Ok(SolverStats {
                    newton_iterations: iteration,
                    cg_iterations,
                    initial_residual,
                    final_residual: residual_norm,
                    wall_time: start.elapsed().as_secs_f64(),
                });
            }
            if iteration == self.config.max_newton_iterations {
                break;
            }

            let rhs: Vec<f64> = residual.iter().map(|r| -r).collect();
            let mut dz = vec![0.0; rhs.len()];
            let cg_stats = {
                let operator = self.model.tangent_operator(state, &weights)?;
                cg.solve(&operator, &rhs, &mut dz).inspect_err(|e| {
                    if e.is_convergence_failure() {
                        tracing::warn!(iteration, error = %e, "linear solve did not converge");
                    }
                })?
            };
            cg_iterations += cg_stats.iterations;
            tracing::debug!(
                iteration,
                cg_iterations = cg_stats.iterations,
                cg_residual = cg_stats.residual_norm,
                "cg solve"
            );

            updater.update_state(state, &dz, dt)?;
            residual = self.residual(state, mode)?;
            residual_norm = norm(&residual);
        }

        tracing::warn!(
            iterations = self.config.max_newton_iterations,
            residual = residual_norm,
            threshold,
            "newton did not converge"
        );
        Err(PliantError::Convergence {
            stage: SolverStage::Newton,
            iterations: self.config.max_newton_iterations,
            residual: residual_norm,
        })
    }
}
