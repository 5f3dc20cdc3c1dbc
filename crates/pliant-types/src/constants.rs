//! Physical constants and simulation defaults.

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Default simulation timestep (seconds). 1/100th of a second.
pub const DEFAULT_DT: f64 = 1.0e-2;

/// Default cap on Newton iterations per timestep.
pub const DEFAULT_NEWTON_ITERATIONS: u32 = 20;

/// Default cap on conjugate-gradient iterations per linear solve.
pub const DEFAULT_CG_ITERATIONS: u32 = 5_000;

/// Default contact proximity margin (meters).
pub const DEFAULT_PROXIMITY_MARGIN: f64 = 1.0e-3;

/// Deformation gradients with |det F| below this are treated as singular.
pub const SINGULAR_DETERMINANT_THRESHOLD: f64 = 1.0e-10;

/// Reference tetrahedra with volume below this are rejected as degenerate.
pub const DEGENERATE_VOLUME_THRESHOLD: f64 = 1.0e-14;

/// Epsilon for floating-point comparisons.
pub const EPSILON: f64 = 1.0e-12;
