//! Contact Jacobians.
//!
//! Row block `i` maps generalized velocities to the contact-frame
//! velocity of the deformable point relative to the rigid point,
//! `Rᵢᵀ (Σ_k w_k v_k − (v_B + ω_B × r))`. A positive normal component
//! means the pair is separating.

use faer::Mat;
use pliant_fem::FemModel;
use pliant_math::decomposition::skew;
use pliant_math::{CsrMatrix, DMat3, DVec3};
use pliant_types::{GeometryId, PliantError, PliantResult};

use crate::contact::ContactPair;
use crate::geometry::RigidGeometry;

/// Deformable block of the contact Jacobian, `3k × num_dofs`.
///
/// Columns of Dirichlet DOFs are left empty: prescribed motion cannot
/// respond to contact impulses.
pub fn deformable_jacobian(pairs: &[ContactPair], model: &FemModel) -> PliantResult<CsrMatrix> {
    let dirichlet = model.dirichlet_boundary_condition();
    let mut triplets = Vec::with_capacity(pairs.len() * 9);

    for (i, pair) in pairs.iter().enumerate() {
        let element = model.elements().get(pair.element.index()).ok_or_else(|| {
            PliantError::ContactConsistency(format!(
                "contact at vertex {} refers to missing element {}",
                pair.vertex, pair.element.0
            ))
        })?;
        if *element.vertices() != pair.element_vertices {
            return Err(PliantError::ContactConsistency(format!(
                "contact at vertex {} lists vertices {:?} for element {}, model has {:?}",
                pair.vertex,
                pair.element_vertices,
                pair.element.0,
                element.vertices()
            )));
        }
        for (slot, &vertex) in element.vertices().iter().enumerate() {
            let w = pair.barycentric[slot];
            if w == 0.0 {
                continue;
            }
            for d in 0..3 {
                let dof = 3 * vertex + d;
                if dirichlet.is_constrained(dof) {
                    continue;
                }
                for r in 0..3 {
                    let value = w * pair.frame.col(r)[d];
                    if value != 0.0 {
                        triplets.push((3 * i + r, dof, value));
                    }
                }
            }
        }
    }

    Ok(CsrMatrix::from_triplets(
        3 * pairs.len(),
        model.num_dofs(),
        &triplets,
    ))
}

/// Looks up the rigid geometry a pair refers to.
pub fn find_geometry(rigid: &[RigidGeometry], id: GeometryId) -> PliantResult<&RigidGeometry> {
    rigid
        .iter()
        .find(|geometry| geometry.id == id)
        .ok_or_else(|| PliantError::ContactConsistency(format!("unknown rigid geometry {}", id.0)))
}

/// Velocity of the rigid contact point in the pair's contact frame.
pub fn rigid_contact_velocity(pair: &ContactPair, geometry: &RigidGeometry) -> DVec3 {
    pair.frame.transpose() * geometry.point_velocity(pair.point)
}

/// Contact-frame relative velocity of every pair, `J v − Rᵀ u_rigid`.
pub fn contact_velocity(
    pairs: &[ContactPair],
    jacobian: &CsrMatrix,
    v: &[f64],
    rigid: &[RigidGeometry],
) -> PliantResult<Vec<f64>> {
    if jacobian.rows != 3 * pairs.len() || jacobian.cols != v.len() {
        return Err(PliantError::ContactConsistency(format!(
            "Jacobian is {}×{}, expected {}×{}",
            jacobian.rows,
            jacobian.cols,
            3 * pairs.len(),
            v.len()
        )));
    }
    let mut vc = vec![0.0; jacobian.rows];
    jacobian.mul_vec(v, &mut vc);
    for (i, pair) in pairs.iter().enumerate() {
        let rigid_velocity = rigid_contact_velocity(pair, find_geometry(rigid, pair.geometry)?);
        for r in 0..3 {
            vc[3 * i + r] -= rigid_velocity[r];
        }
    }
    Ok(vc)
}

/// Adds the rigid bodies' share `J_r M⁻¹ J_rᵀ` to a contact-space Delassus
/// operator. Kinematic geometries contribute nothing.
///
/// Pair `j` pushes its rigid body with `−R_j γ_j`, so the coupling block
/// between pairs on the same body is
/// `Rᵢᵀ (m⁻¹ I − [rᵢ]× I⁻¹ [r_j]×) R_j`.
pub fn add_rigid_delassus(
    pairs: &[ContactPair],
    rigid: &[RigidGeometry],
    delassus: &mut Mat<f64>,
) -> PliantResult<()> {
    let k = pairs.len();
    if delassus.nrows() != 3 * k || delassus.ncols() != 3 * k {
        return Err(PliantError::ContactConsistency(format!(
            "Delassus operator is {}×{}, expected {}×{}",
            delassus.nrows(),
            delassus.ncols(),
            3 * k,
            3 * k
        )));
    }

    for (i, pi) in pairs.iter().enumerate() {
        let geometry = find_geometry(rigid, pi.geometry)?;
        let Some((inv_mass, inv_inertia)) = geometry.world_inverse_inertia() else {
            continue;
        };
        let ri = skew(pi.point - geometry.pose.translation);
        for (j, pj) in pairs.iter().enumerate() {
            if pj.geometry != pi.geometry {
                continue;
            }
            let rj = skew(pj.point - geometry.pose.translation);
            let world = DMat3::from_diagonal(DVec3::splat(inv_mass)) - ri * inv_inertia * rj;
            let block = pi.frame.transpose() * world * pj.frame;
            for r in 0..3 {
                for c in 0..3 {
                    delassus[(3 * i + r, 3 * j + c)] += block.col(c)[r];
                }
            }
        }
    }
    Ok(())
}
