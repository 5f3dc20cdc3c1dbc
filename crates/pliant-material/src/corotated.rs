//! Corotated linear elasticity.
//!
//! Performs the polar decomposition F = R·S and measures strain in the
//! rotated frame, so rigid rotations cost no energy. The volumetric term
//! uses J = det F.
//!
//! ```text
//! Ψ = μ ‖F − R‖² + ½λ (J − 1)²
//! P = 2μ (F − R) + λ (J − 1) J F⁻ᵀ
//! ```
//!
//! The tangent differentiates R exactly: with Ω = RᵀdR (skew),
//! `axial(Ω) = (tr(S) I − S)⁻¹ · axial(RᵀdF − dFᵀR)`.

use pliant_math::decomposition::{
    axial_vector, frobenius_inner, frobenius_norm, polar_decomposition, skew, PolarDecomposition,
};
use pliant_math::{DMat3, Tensor9};
use pliant_types::constants::SINGULAR_DETERMINANT_THRESHOLD;
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

use crate::properties::LameParameters;
use crate::traits::{ConstitutiveModel, ConstitutiveResponse};

/// Corotated constitutive model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorotatedModel {
    lame: LameParameters,
}

/// Quantities shared by energy, stress and tangent at one F.
struct Kinematics {
    f: DMat3,
    polar: PolarDecomposition,
    j: f64,
    f_inv_t: DMat3,
}

impl CorotatedModel {
    /// Creates a model from Lamé parameters.
    pub fn new(lame: LameParameters) -> Self {
        Self { lame }
    }

    /// Returns the Lamé parameters.
    pub fn lame(&self) -> LameParameters {
        self.lame
    }

    fn kinematics(f: &DMat3) -> PliantResult<Kinematics> {
        let polar = polar_decomposition(f)?;
        let j = f.determinant();
        Ok(Kinematics {
            f: *f,
            polar,
            j,
            f_inv_t: f.inverse().transpose(),
        })
    }

    fn energy(&self, k: &Kinematics) -> f64 {
        let diff = k.f - k.polar.rotation;
        self.lame.mu * frobenius_inner(&diff, &diff) + 0.5 * self.lame.lambda * (k.j - 1.0).powi(2)
    }

    fn stress(&self, k: &Kinematics) -> DMat3 {
        (k.f - k.polar.rotation) * (2.0 * self.lame.mu)
            + k.f_inv_t * (self.lame.lambda * (k.j - 1.0) * k.j)
    }

    fn tangent(&self, k: &Kinematics) -> PliantResult<Tensor9> {
        let LameParameters { mu, lambda } = self.lame;
        let r = k.polar.rotation;
        let s = k.polar.stretch;
        let trace_s = s.x_axis.x + s.y_axis.y + s.z_axis.z;
        let g = DMat3::IDENTITY * trace_s - s;
        let det_g = g.determinant();
        if det_g.abs() < SINGULAR_DETERMINANT_THRESHOLD * frobenius_norm(&s).powi(3).max(1.0) {
            return Err(PliantError::Numerical(format!(
                "rotation differential is singular (det(tr(S)I − S) = {det_g:.3e})"
            )));
        }
        let g_inv = g.inverse();
        let j = k.j;
        let fit = k.f_inv_t;

        Ok(Tensor9::from_columns(|df| {
            // Rotation differential dR = R Ω.
            let m = r.transpose() * *df;
            let omega = g_inv * axial_vector(&(m - m.transpose()));
            let dr = r * skew(omega);

            // Volumetric part: d[(J − 1) J F⁻ᵀ].
            let fit_df = frobenius_inner(&fit, df);
            let volumetric = fit * ((2.0 * j - 1.0) * j * fit_df)
                - fit * df.transpose() * fit * ((j - 1.0) * j);

            (*df - dr) * (2.0 * mu) + volumetric * lambda
        }))
    }
}

impl ConstitutiveModel for CorotatedModel {
    fn calc_energy_density(&self, f: &DMat3) -> PliantResult<f64> {
        Ok(self.energy(&Self::kinematics(f)?))
    }

    fn calc_stress(&self, f: &DMat3) -> PliantResult<DMat3> {
        Ok(self.stress(&Self::kinematics(f)?))
    }

    fn calc_tangent(&self, f: &DMat3) -> PliantResult<Tensor9> {
        self.tangent(&Self::kinematics(f)?)
    }

    fn evaluate(&self, f: &DMat3) -> PliantResult<ConstitutiveResponse> {
        let k = Self::kinematics(f)?;
        Ok(ConstitutiveResponse {
            energy_density: self.energy(&k),
            stress: self.stress(&k),
            tangent: self.tangent(&k)?,
        })
    }

    fn name(&self) -> &str {
        "corotated"
    }
}
