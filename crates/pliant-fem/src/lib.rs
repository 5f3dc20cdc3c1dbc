//! # pliant-fem
//!
//! Finite-element dynamics of deformable bodies.
//!
//! ## Key Types
//!
//! - [`FemElement`] — Linear tetrahedron with its material
//! - [`FemState`] — `q, v, a` plus the generation-stamped element cache
//! - [`DirichletBoundaryCondition`] — Prescribed DOFs
//! - [`StateUpdater`] — Newmark (acceleration or velocity form) and
//!   zeroth-order schemes
//! - [`FemModel`] — Residual and tangent assembly
//! - [`FemSolver`] — Newton iteration with a matrix-free CG inner solve
//! - [`SolverConfig`] / [`NewmarkParameters`] — Serializable settings

pub mod boundary;
pub mod config;
pub mod element;
pub mod model;
pub mod solver;
pub mod state;
pub mod state_updater;

pub use boundary::{DirichletBoundaryCondition, DirichletValue};
pub use config::{IntegrationScheme, NewmarkParameters, SolverConfig};
pub use element::FemElement;
pub use model::{FemModel, TangentOperator};
pub use solver::{FemSolver, SolverStats};
pub use state::{DeformationGradientData, ElementCacheEntry, FemState};
pub use state_updater::{StateUpdater, WeightedSum};
