//! # pliant-coupling
//!
//! Time-step orchestration for deformable bodies in contact with rigid
//! geometry.
//!
//! - [`SimulationConfig`] — One TOML-loadable document for the whole run
//! - [`RigidBodyPlant`] — Seam to the rigid-body simulator
//! - [`DeformableRigidManager`] — Free motion, contact discovery, Schur
//!   reduction, contact solve and commit, once per step

pub mod config;
pub mod manager;
pub mod plant;
pub mod stepper;

pub use config::{ContactConfig, SimulationConfig};
pub use manager::{ContactResult, DeformableRigidManager, StepReport};
pub use plant::{KinematicRigidWorld, RigidBodyPlant};
pub use stepper::{run_until, TimeStepper};
