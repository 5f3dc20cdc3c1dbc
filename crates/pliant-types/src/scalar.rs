//! Scalar type alias for the simulation.
//!
//! Implicit integration with Newton/CG needs double precision: residual
//! tolerances are routinely below single-precision round-off.

/// The floating-point type used throughout the simulation.
pub type Scalar = f64;
