//! Constitutive model trait — the core material abstraction.
//!
//! Every material model implements this trait, so the FEM element can
//! evaluate stress and stiffness without knowing which model it holds.

use pliant_math::{DMat3, Tensor9};
use pliant_types::PliantResult;

/// Everything an element needs from its material at one quadrature point.
#[derive(Debug, Clone, Copy)]
pub struct ConstitutiveResponse {
    /// Strain energy density Ψ(F).
    pub energy_density: f64,
    /// First Piola–Kirchhoff stress P = ∂Ψ/∂F.
    pub stress: DMat3,
    /// Tangent ∂P/∂F over column-major vec(F).
    pub tangent: Tensor9,
}

/// Trait for hyperelastic constitutive models.
///
/// All methods are pure functions of the deformation gradient and the
/// model's parameters.
///
/// # Errors
///
/// Models that need F⁻¹ or a polar decomposition return
/// `PliantError::Numerical` when F is (near-)singular.
pub trait ConstitutiveModel: Send + Sync {
    /// Strain energy density Ψ(F) per unit reference volume.
    fn calc_energy_density(&self, f: &DMat3) -> PliantResult<f64>;

    /// First Piola–Kirchhoff stress.
    fn calc_stress(&self, f: &DMat3) -> PliantResult<DMat3>;

    /// Stress derivative ∂P/∂F.
    fn calc_tangent(&self, f: &DMat3) -> PliantResult<Tensor9>;

    /// Energy, stress and tangent in one call. Models override this to
    /// share intermediate results (e.g. the polar decomposition).
    fn evaluate(&self, f: &DMat3) -> PliantResult<ConstitutiveResponse> {
        Ok(ConstitutiveResponse {
            energy_density: self.calc_energy_density(f)?,
            stress: self.calc_stress(f)?,
            tangent: self.calc_tangent(f)?,
        })
    }

    /// Returns the name of this constitutive model.
    fn name(&self) -> &str;
}
