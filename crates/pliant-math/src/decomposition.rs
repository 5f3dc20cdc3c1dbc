//! Matrix decompositions for constitutive models.
//!
//! Provides the polar decomposition (F = R·S) needed by the corotated
//! model, and the deformation gradient of a linear tetrahedron.

use glam::{DMat3, DVec3};
use pliant_types::constants::SINGULAR_DETERMINANT_THRESHOLD;
use pliant_types::{PliantError, PliantResult};

/// Result of a 3×3 polar decomposition: F = R · S
#[derive(Debug, Clone, Copy)]
pub struct PolarDecomposition {
    /// Proper rotation (orthonormal, det = +1 for non-inverted F).
    pub rotation: DMat3,
    /// Symmetric stretch S = Rᵀ F.
    pub stretch: DMat3,
}

const POLAR_MAX_ITERATIONS: usize = 50;
const POLAR_TOLERANCE: f64 = 1e-14;

/// Compute the polar decomposition of a 3×3 deformation gradient.
///
/// Uses Higham's scaled Newton iteration `R ← ½(ζR + ζ⁻¹R⁻ᵀ)` with the
/// determinant scaling `ζ = |det R|^{-1/3}`, which converges quadratically
/// for any non-singular F.
///
/// # Errors
/// `Numerical` if |det F| is below the singularity threshold, or if the
/// iteration produces a singular iterate.
pub fn polar_decomposition(f: &DMat3) -> PliantResult<PolarDecomposition> {
    let det = f.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT_THRESHOLD {
        return Err(PliantError::Numerical(format!(
            "polar decomposition of near-singular deformation gradient (det F = {det:.3e})"
        )));
    }

    let mut r = *f;
    for _ in 0..POLAR_MAX_ITERATIONS {
        let det_r = r.determinant();
        if det_r.abs() < SINGULAR_DETERMINANT_THRESHOLD {
            return Err(PliantError::Numerical(
                "polar decomposition iterate became singular".into(),
            ));
        }
        let zeta = det_r.abs().powf(-1.0 / 3.0);
        let inv_t = r.inverse().transpose();
        let next = (r * zeta + inv_t * (1.0 / zeta)) * 0.5;
        let change = frobenius_norm(&(next - r));
        r = next;
        if change <= POLAR_TOLERANCE * frobenius_norm(&r) {
            break;
        }
    }

    let mut stretch = r.transpose() * *f;
    // Symmetrize away round-off.
    stretch = (stretch + stretch.transpose()) * 0.5;

    Ok(PolarDecomposition {
        rotation: r,
        stretch,
    })
}

/// Compute the deformation gradient F of a linear tetrahedron.
///
/// F = Ds · Dm⁻¹, where Ds = [x1−x0, x2−x0, x3−x0] in the deformed
/// configuration and Dm⁻¹ is the precomputed inverse of the same matrix
/// in the reference configuration.
pub fn deformation_gradient(x: &[DVec3; 4], dm_inv: &DMat3) -> DMat3 {
    edge_matrix(x) * *dm_inv
}

/// Edge matrix [x1−x0, x2−x0, x3−x0] (columns).
pub fn edge_matrix(x: &[DVec3; 4]) -> DMat3 {
    DMat3::from_cols(x[1] - x[0], x[2] - x[0], x[3] - x[0])
}

/// Frobenius norm ‖A‖_F.
pub fn frobenius_norm(a: &DMat3) -> f64 {
    frobenius_inner(a, a).sqrt()
}

/// Frobenius inner product A : B.
pub fn frobenius_inner(a: &DMat3, b: &DMat3) -> f64 {
    a.x_axis.dot(b.x_axis) + a.y_axis.dot(b.y_axis) + a.z_axis.dot(b.z_axis)
}

/// Axial vector of the skew part: for K skew, K v = axial(K) × v.
pub fn axial_vector(k: &DMat3) -> DVec3 {
    // Column-major: k.col(j)[i] = K[i][j].
    DVec3::new(
        0.5 * (k.y_axis.z - k.z_axis.y),
        0.5 * (k.z_axis.x - k.x_axis.z),
        0.5 * (k.x_axis.y - k.y_axis.x),
    )
}

/// Skew-symmetric cross-product matrix: `skew(w) v = w × v`.
pub fn skew(w: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, w.z, -w.y),
        DVec3::new(-w.z, 0.0, w.x),
        DVec3::new(w.y, -w.x, 0.0),
    )
}
