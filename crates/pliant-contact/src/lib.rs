//! # pliant-contact
//!
//! Contact between deformable bodies and rigid geometry.
//!
//! The contact pipeline is split into three phases:
//! 1. **Discovery** — BVH culling and signed-distance sampling of boundary
//!    vertices ([`ContactDetector`])
//! 2. **Reduction** — Contact Jacobians and the [`SchurComplement`] that
//!    folds the deformable tangent onto the contact vertices
//! 3. **Resolution** — A pluggable [`ContactSolver`] that turns the
//!    contact-space problem into impulses

pub mod bvh;
pub mod contact;
pub mod detector;
pub mod geometry;
pub mod jacobian;
pub mod schur;
pub mod solver;

pub use bvh::Bvh;
pub use contact::{contact_frame, ContactPair, DeformableContactData};
pub use detector::ContactDetector;
pub use geometry::{Aabb, Pose, RigidGeometry, RigidMass, Shape};
pub use schur::SchurComplement;
pub use solver::{ContactImpulses, ContactProblem, ContactSolver, PgsContactSolver};
