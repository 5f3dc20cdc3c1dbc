//! Simulation event types.
//!
//! Structured events emitted by the coupling manager at various points
//! in each time step. Events are lightweight value types that carry
//! just enough data to be useful for monitoring and debugging.

use serde::{Deserialize, Serialize};

/// A simulation event emitted by the engine.
///
/// Events are tagged with a time step index and carry domain-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Time step number (0-indexed).
    pub timestep: u64,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Time step started.
    TimestepBegin {
        /// Simulation time at the start of the step (seconds).
        sim_time: f64,
        /// Step size (seconds).
        dt: f64,
    },

    /// Time step committed.
    TimestepEnd {
        /// Wall-clock time for the entire step (seconds).
        wall_time: f64,
    },

    /// Free-motion Newton solve of one deformable body finished.
    Convergence {
        /// Deformable body index.
        body: u32,
        /// Newton iterations used.
        newton_iterations: u32,
        /// CG iterations summed over all Newton iterations.
        cg_iterations: u32,
        /// Residual norm before the first iteration.
        initial_residual: f64,
        /// Residual norm at acceptance.
        final_residual: f64,
    },

    /// Contact detection for one deformable body finished.
    ContactDetection {
        /// Deformable body index.
        body: u32,
        /// Number of contact pairs.
        contact_count: u32,
        /// Maximum penetration depth (meters).
        max_penetration: f64,
    },

    /// Contact-space solve finished.
    ContactSolve {
        /// Pairs in the contact-space problem.
        contact_count: u32,
        /// Solver sweeps.
        iterations: u32,
        /// Sum of the normal impulses (N·s).
        total_normal_impulse: f64,
    },

    /// Energy snapshot of one deformable body after the step.
    Energy {
        /// Deformable body index.
        body: u32,
        /// Kinetic energy (½ vᵀ M v).
        kinetic: f64,
        /// Elastic strain energy.
        elastic: f64,
    },
}

impl SimulationEvent {
    /// Creates a new event for the given time step.
    pub fn new(timestep: u64, kind: EventKind) -> Self {
        Self { timestep, kind }
    }
}
