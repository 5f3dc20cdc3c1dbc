//! Core tetrahedral mesh type.
//!
//! Positions are the reference (undeformed) configuration. Deformed
//! positions live in the FEM state, never in the mesh.

use pliant_math::DVec3;
use pliant_types::constants::DEGENERATE_VOLUME_THRESHOLD;
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// A linear tetrahedral mesh.
///
/// Each tetrahedron is `[v0, v1, v2, v3]` with positive orientation:
/// `det[v1−v0, v2−v0, v3−v0] > 0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeMesh {
    /// Reference positions of all vertices.
    pub vertices: Vec<DVec3>,
    /// Vertex indices of every tetrahedron.
    pub tetrahedra: Vec<[usize; 4]>,
}

impl VolumeMesh {
    /// Creates a mesh and validates it.
    pub fn new(vertices: Vec<DVec3>, tetrahedra: Vec<[usize; 4]>) -> PliantResult<Self> {
        let mesh = Self {
            vertices,
            tetrahedra,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of tetrahedra.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.tetrahedra.len()
    }

    /// Returns the number of degrees of freedom (3 per vertex).
    #[inline]
    pub fn dof_count(&self) -> usize {
        3 * self.vertices.len()
    }

    /// Returns the four reference positions of tetrahedron `e`.
    #[inline]
    pub fn element_positions(&self, e: usize) -> [DVec3; 4] {
        self.tetrahedra[e].map(|v| self.vertices[v])
    }

    /// Signed volume of tetrahedron `e` in the reference configuration.
    pub fn signed_volume(&self, e: usize) -> f64 {
        let [x0, x1, x2, x3] = self.element_positions(e);
        (x1 - x0).cross(x2 - x0).dot(x3 - x0) / 6.0
    }

    /// Total reference volume.
    pub fn total_volume(&self) -> f64 {
        (0..self.element_count()).map(|e| self.signed_volume(e)).sum()
    }

    /// Reference positions flattened into a DOF vector `[x0, y0, z0, x1, ...]`.
    pub fn positions_flat(&self) -> Vec<f64> {
        self.vertices.iter().flat_map(|p| p.to_array()).collect()
    }

    /// Translates every vertex by `offset`.
    pub fn translate(&mut self, offset: DVec3) {
        for p in &mut self.vertices {
            *p += offset;
        }
    }

    /// Axis-aligned bounds `(min, max)` of the reference positions.
    pub fn bounds(&self) -> (DVec3, DVec3) {
        self.vertices.iter().fold(
            (DVec3::splat(f64::INFINITY), DVec3::splat(f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        )
    }

    /// Validates mesh integrity.
    ///
    /// Checks:
    /// - At least one tetrahedron
    /// - Vertex indices are within bounds and distinct per tetrahedron
    /// - Every tetrahedron has positive volume
    pub fn validate(&self) -> PliantResult<()> {
        if self.tetrahedra.is_empty() {
            return Err(PliantError::InvalidMesh("mesh has no tetrahedra".into()));
        }

        let n = self.vertices.len();
        for (e, tet) in self.tetrahedra.iter().enumerate() {
            if let Some(&bad) = tet.iter().find(|&&v| v >= n) {
                return Err(PliantError::InvalidMesh(format!(
                    "Tetrahedron {e} references vertex {bad} (vertex count: {n})"
                )));
            }
            for i in 0..4 {
                for j in (i + 1)..4 {
                    if tet[i] == tet[j] {
                        return Err(PliantError::InvalidMesh(format!(
                            "Tetrahedron {e} has repeated vertex indices: {tet:?}"
                        )));
                    }
                }
            }
            let volume = self.signed_volume(e);
            if volume <= DEGENERATE_VOLUME_THRESHOLD {
                return Err(PliantError::InvalidMesh(format!(
                    "Tetrahedron {e} is inverted or degenerate (volume {volume:.3e})"
                )));
            }
        }

        Ok(())
    }
}
