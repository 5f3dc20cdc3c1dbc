//! # pliant-mesh
//!
//! Tetrahedral volume meshes for the pliant FEM engine.
//!
//! ## Key Types
//!
//! - [`VolumeMesh`] — Reference vertex positions plus linear tetrahedra.
//! - [`VolumeTopology`] — Vertex-to-element adjacency and the outward
//!   oriented boundary surface.
//! - Procedural generators for test and demo meshes (structured boxes).

pub mod generators;
pub mod mesh;
pub mod topology;

pub use mesh::VolumeMesh;
pub use topology::VolumeTopology;
