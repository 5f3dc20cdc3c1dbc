//! Contact pair data types.
//!
//! `ContactPair` represents a detected proximity or penetration between
//! a rigid geometry and a point on the boundary of a deformable body:
//! either a boundary vertex or the deepest point of a boundary face.

use pliant_math::{DMat3, DVec3};
use pliant_types::{BodyId, ElementId, GeometryId};
use serde::{Deserialize, Serialize};

/// A detected rigid/deformable contact.
///
/// Carries all geometric data needed to build the contact Jacobian and
/// to report contact results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPair {
    /// Rigid geometry involved.
    pub geometry: GeometryId,

    /// Deformable body involved.
    pub body: BodyId,

    /// Contact vertex, or for a face contact the face vertex with the
    /// largest weight.
    pub vertex: usize,

    /// World position of the contact point on the deformable body.
    pub point: DVec3,

    /// Signed distance (negative = penetration).
    pub separation: f64,

    /// Contact frame `[t1, t2, n]` as columns. `n` is the unit normal
    /// pointing out of the rigid geometry into the deformable body.
    pub frame: DMat3,

    /// Element the contact point is interpolated from.
    pub element: ElementId,

    /// Vertices of `element`, in the element's order.
    pub element_vertices: [usize; 4],

    /// Barycentric weights over `element_vertices`.
    pub barycentric: [f64; 4],
}

impl ContactPair {
    /// Unit normal, out of the rigid geometry.
    pub fn normal(&self) -> DVec3 {
        self.frame.z_axis
    }

    /// Returns the penetration depth (positive if penetrating, zero otherwise).
    pub fn penetration_depth(&self) -> f64 {
        (-self.separation).max(0.0)
    }

    /// Returns true if the contact represents actual penetration.
    pub fn is_penetrating(&self) -> bool {
        self.separation < 0.0
    }

    /// Vertices with a non-zero weight in this contact.
    pub fn weighted_vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.element_vertices
            .iter()
            .zip(&self.barycentric)
            .filter(|(_, w)| **w != 0.0)
            .map(|(&v, _)| v)
    }

    /// Expresses a contact-frame vector `(t1, t2, n)` in world coordinates.
    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.frame * local
    }
}

/// Right-handed frame `[t1, t2, n]` around a unit normal.
pub fn contact_frame(normal: DVec3) -> DMat3 {
    let t1 = normal.any_orthonormal_vector();
    let t2 = normal.cross(t1);
    DMat3::from_cols(t1, t2, normal)
}

/// All contacts of one deformable body in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeformableContactData {
    pub body: BodyId,
    pub pairs: Vec<ContactPair>,
}

impl DeformableContactData {
    pub fn new(body: BodyId) -> Self {
        Self {
            body,
            pairs: Vec::new(),
        }
    }

    pub fn num_contacts(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Deformable vertices with weight in at least one contact
    /// (ascending, unique).
    pub fn participating_vertices(&self) -> Vec<usize> {
        let mut vertices: Vec<usize> = self
            .pairs
            .iter()
            .flat_map(|pair| pair.weighted_vertices())
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    /// Deepest penetration over all pairs (zero if none penetrate).
    pub fn max_penetration(&self) -> f64 {
        self.pairs
            .iter()
            .map(ContactPair::penetration_depth)
            .fold(0.0, f64::max)
    }
}
