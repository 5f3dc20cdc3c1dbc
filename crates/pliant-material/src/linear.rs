//! Isotropic linear elasticity (small strain).
//!
//! Strain is measured as the symmetric part of the displacement gradient,
//! so rigid rotations register as strain. Cheap and exact for the small
//! deformations it is meant for; use [`CorotatedModel`](crate::CorotatedModel)
//! once elements rotate.
//!
//! ```text
//! ε = ½(F + Fᵀ) − I
//! Ψ = μ ε:ε + ½λ tr(ε)²
//! P = 2μ ε + λ tr(ε) I
//! ```

use pliant_math::decomposition::frobenius_inner;
use pliant_math::{DMat3, Tensor9};
use pliant_types::PliantResult;
use serde::{Deserialize, Serialize};

use crate::properties::LameParameters;
use crate::traits::ConstitutiveModel;

/// Linear elastic constitutive model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    lame: LameParameters,
}

impl LinearModel {
    /// Creates a model from Lamé parameters.
    pub fn new(lame: LameParameters) -> Self {
        Self { lame }
    }

    /// Returns the Lamé parameters.
    pub fn lame(&self) -> LameParameters {
        self.lame
    }

    fn strain(f: &DMat3) -> DMat3 {
        (*f + f.transpose()) * 0.5 - DMat3::IDENTITY
    }

    /// dP for a perturbation dF; the model is linear so this is exact.
    fn stress_differential(&self, df: &DMat3) -> DMat3 {
        let LameParameters { mu, lambda } = self.lame;
        let trace = df.x_axis.x + df.y_axis.y + df.z_axis.z;
        (*df + df.transpose()) * mu + DMat3::IDENTITY * (lambda * trace)
    }
}

impl ConstitutiveModel for LinearModel {
    fn calc_energy_density(&self, f: &DMat3) -> PliantResult<f64> {
        let eps = Self::strain(f);
        let trace = eps.x_axis.x + eps.y_axis.y + eps.z_axis.z;
        Ok(self.lame.mu * frobenius_inner(&eps, &eps) + 0.5 * self.lame.lambda * trace * trace)
    }

    fn calc_stress(&self, f: &DMat3) -> PliantResult<DMat3> {
        let eps = Self::strain(f);
        let trace = eps.x_axis.x + eps.y_axis.y + eps.z_axis.z;
        Ok(eps * (2.0 * self.lame.mu) + DMat3::IDENTITY * (self.lame.lambda * trace))
    }

    fn calc_tangent(&self, _f: &DMat3) -> PliantResult<Tensor9> {
        Ok(Tensor9::from_columns(|df| self.stress_differential(df)))
    }

    fn name(&self) -> &str {
        "linear"
    }
}
