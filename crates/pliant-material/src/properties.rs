//! Physical material properties.
//!
//! Engineering parameters as they are measured, plus the conversion to
//! the Lamé parameters the constitutive models use.

use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// Physical properties of an isotropic elastic solid.
///
/// | Field | Meaning | Unit |
/// |---|---|---|
/// | `youngs_modulus` | Young's modulus E | Pa |
/// | `poisson_ratio` | Poisson ratio ν | – |
/// | `mass_density` | Mass density ρ | kg/m³ |
/// | `mass_damping` | Rayleigh α (D = αM + βK) | 1/s |
/// | `stiffness_damping` | Rayleigh β | s |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialProperties {
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub mass_density: f64,
    pub mass_damping: f64,
    pub stiffness_damping: f64,
}

/// Lamé parameters (μ, λ).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LameParameters {
    /// Shear modulus μ = E / (2(1+ν)).
    pub mu: f64,
    /// First Lamé parameter λ = Eν / ((1+ν)(1−2ν)).
    pub lambda: f64,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self::soft_rubber()
    }
}

impl MaterialProperties {
    /// Soft rubber: E = 1 MPa, ν = 0.4, ρ = 1000 kg/m³, no damping.
    pub fn soft_rubber() -> Self {
        Self {
            youngs_modulus: 1.0e6,
            poisson_ratio: 0.4,
            mass_density: 1000.0,
            mass_damping: 0.0,
            stiffness_damping: 0.0,
        }
    }

    /// Open-cell foam: very soft, light, mildly damped.
    pub fn foam() -> Self {
        Self {
            youngs_modulus: 5.0e4,
            poisson_ratio: 0.25,
            mass_density: 50.0,
            mass_damping: 0.5,
            stiffness_damping: 0.01,
        }
    }

    /// Validates the parameter ranges.
    ///
    /// Requires E > 0, −1 < ν < 0.5, ρ > 0 and non-negative damping.
    pub fn validate(&self) -> PliantResult<()> {
        if !(self.youngs_modulus > 0.0 && self.youngs_modulus.is_finite()) {
            return Err(PliantError::InvalidMaterial(format!(
                "Young's modulus must be positive, got {}",
                self.youngs_modulus
            )));
        }
        if !(self.poisson_ratio > -1.0 && self.poisson_ratio < 0.5) {
            return Err(PliantError::InvalidMaterial(format!(
                "Poisson ratio must lie in (-1, 0.5), got {}",
                self.poisson_ratio
            )));
        }
        if !(self.mass_density > 0.0 && self.mass_density.is_finite()) {
            return Err(PliantError::InvalidMaterial(format!(
                "mass density must be positive, got {}",
                self.mass_density
            )));
        }
        if self.mass_damping < 0.0 || self.stiffness_damping < 0.0 {
            return Err(PliantError::InvalidMaterial(format!(
                "damping coefficients must be non-negative, got α = {}, β = {}",
                self.mass_damping, self.stiffness_damping
            )));
        }
        Ok(())
    }

    /// Converts (E, ν) to Lamé parameters.
    pub fn lame(&self) -> LameParameters {
        let e = self.youngs_modulus;
        let nu = self.poisson_ratio;
        LameParameters {
            mu: e / (2.0 * (1.0 + nu)),
            lambda: e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu)),
        }
    }
}
