//! # pliant-material
//!
//! Constitutive models and material parameters.
//!
//! ## Design
//!
//! The [`ConstitutiveModel`] trait maps a deformation gradient F to the
//! strain energy density, the first Piola–Kirchhoff stress P = ∂Ψ/∂F and
//! the tangent ∂P/∂F. The variant set is closed: [`LinearModel`] for
//! small strains and [`CorotatedModel`] for large rotations, dispatched
//! through the [`Material`] enum so elements can store models by value.
//!
//! [`MaterialProperties`] holds the engineering parameters (Young's
//! modulus, Poisson ratio, density, Rayleigh damping) and converts them
//! to Lamé parameters.

pub mod corotated;
pub mod linear;
pub mod material;
pub mod properties;
pub mod traits;

pub use corotated::CorotatedModel;
pub use linear::LinearModel;
pub use material::{Material, MaterialModelKind};
pub use properties::{LameParameters, MaterialProperties};
pub use traits::{ConstitutiveModel, ConstitutiveResponse};
