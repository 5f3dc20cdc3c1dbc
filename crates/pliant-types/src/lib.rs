//! # pliant-types
//!
//! Shared types, identifiers, error types, and physical constants
//! for the pliant soft-body simulation engine.
//!
//! This crate has zero domain logic — it defines the vocabulary
//! that all other pliant crates share.

pub mod constants;
pub mod error;
pub mod ids;
pub mod scalar;

pub use error::{PliantError, PliantResult, SolverStage};
pub use ids::{BodyId, ElementId, GeometryId, VertexId};
pub use scalar::Scalar;
