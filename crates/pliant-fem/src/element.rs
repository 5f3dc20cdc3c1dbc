//! Linear tetrahedral finite element.
//!
//! Precomputes the reference-state data of one tetrahedron (inverse edge
//! matrix, shape-function gradients, volume, lumped mass) and evaluates
//! its internal force and stiffness for a given state.
//!
//! ## Kinematics
//!
//! With linear shape functions the gradients ∇N_a are constant, so
//! a single quadrature point at the centroid is exact for the mass and
//! sufficient for the stiffness:
//!
//! ```text
//! F  = Σ_a x_a ⊗ ∇N_a = Ds · Dm⁻¹
//! f_a = V · P(F) · ∇N_a
//! K_ab[i][j] = V · Σ_kl ∂P_ik/∂F_jl · ∇N_a[k] · ∇N_b[l]
//! ```

use pliant_math::decomposition::{deformation_gradient, edge_matrix};
use pliant_math::tensor::vec_index;
use pliant_math::{DMat3, DVec3};
use pliant_material::{ConstitutiveModel, Material};
use pliant_types::constants::DEGENERATE_VOLUME_THRESHOLD;
use pliant_types::{ElementId, PliantError, PliantResult};

use crate::state::{DeformationGradientData, ElementCacheEntry};

/// Vertices per element.
pub const NODES_PER_ELEMENT: usize = 4;
/// Degrees of freedom per element.
pub const ELEMENT_DOFS: usize = 3 * NODES_PER_ELEMENT;
/// Quadrature points per element (single centroid rule).
pub const QUADRATURE_POINTS: usize = 1;

/// Precomputed data for one linear tetrahedron.
#[derive(Debug, Clone)]
pub struct FemElement {
    id: ElementId,
    vertices: [usize; NODES_PER_ELEMENT],
    dm_inv: DMat3,
    shape_gradients: [DVec3; NODES_PER_ELEMENT],
    volume: f64,
    /// Quadrature weights (reference volume per point).
    quadrature_weights: [f64; QUADRATURE_POINTS],
    lumped_mass: f64,
    materials: [Material; QUADRATURE_POINTS],
}

impl FemElement {
    /// Builds an element from its vertex indices and reference positions.
    ///
    /// # Errors
    /// - `InvalidConfig` if a vertex index is not below `num_vertices`.
    /// - `InvalidMesh` if the reference tetrahedron is inverted or degenerate.
    pub fn new(
        id: ElementId,
        vertices: [usize; NODES_PER_ELEMENT],
        reference: &[DVec3; NODES_PER_ELEMENT],
        material: Material,
        mass_density: f64,
        num_vertices: usize,
    ) -> PliantResult<Self> {
        if let Some(&bad) = vertices.iter().find(|&&v| v >= num_vertices) {
            return Err(PliantError::InvalidConfig(format!(
                "element {} references vertex {bad}, but the body has {num_vertices} vertices",
                id.0
            )));
        }

        let dm = edge_matrix(reference);
        let volume = dm.determinant() / 6.0;
        if !(volume > DEGENERATE_VOLUME_THRESHOLD) {
            return Err(PliantError::InvalidMesh(format!(
                "element {} is inverted or degenerate in the reference configuration (volume {volume:.3e})",
                id.0
            )));
        }
        let dm_inv = dm.inverse();

        // ∇N_1..3 are the rows of Dm⁻¹, ∇N_0 = −(∇N_1 + ∇N_2 + ∇N_3).
        let g1 = dm_inv.row(0);
        let g2 = dm_inv.row(1);
        let g3 = dm_inv.row(2);
        let shape_gradients = [-(g1 + g2 + g3), g1, g2, g3];

        Ok(Self {
            id,
            vertices,
            dm_inv,
            shape_gradients,
            volume,
            quadrature_weights: [volume],
            lumped_mass: mass_density * volume / NODES_PER_ELEMENT as f64,
            materials: [material],
        })
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Global vertex indices.
    #[inline]
    pub fn vertices(&self) -> &[usize; NODES_PER_ELEMENT] {
        &self.vertices
    }

    /// Reference volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Mass lumped onto each vertex: ρV/4.
    #[inline]
    pub fn lumped_mass(&self) -> f64 {
        self.lumped_mass
    }

    /// Shape-function gradients in the reference configuration.
    #[inline]
    pub fn shape_gradients(&self) -> &[DVec3; NODES_PER_ELEMENT] {
        &self.shape_gradients
    }

    /// Material at quadrature point `qp`.
    #[inline]
    pub fn material(&self, qp: usize) -> &Material {
        &self.materials[qp]
    }

    /// Global DOF index of local DOF `local` (0..12).
    #[inline]
    pub fn global_dof(&self, local: usize) -> usize {
        3 * self.vertices[local / 3] + local % 3
    }

    fn gather(&self, x: &[f64]) -> [DVec3; NODES_PER_ELEMENT] {
        self.vertices
            .map(|v| DVec3::new(x[3 * v], x[3 * v + 1], x[3 * v + 2]))
    }

    /// F and Ḟ at every quadrature point.
    pub fn calc_deformation_gradient_data(&self, q: &[f64], v: &[f64]) -> DeformationGradientData {
        let f = deformation_gradient(&self.gather(q), &self.dm_inv);
        let f_dot = deformation_gradient(&self.gather(v), &self.dm_inv);
        DeformationGradientData {
            deformation_gradient: [f],
            deformation_gradient_dot: [f_dot],
        }
    }

    /// Evaluates energy, internal force and stiffness at state `(q, v)`.
    ///
    /// The returned cache entry carries `stamp = Some(generation)`.
    ///
    /// # Errors
    /// `Numerical` (naming this element) if the material cannot be
    /// evaluated at the current deformation gradient.
    pub fn evaluate(&self, q: &[f64], v: &[f64], generation: u64) -> PliantResult<ElementCacheEntry> {
        let data = self.calc_deformation_gradient_data(q, v);
        let mut entry = ElementCacheEntry {
            stamp: Some(generation),
            deformation: data,
            ..ElementCacheEntry::default()
        };

        for qp in 0..QUADRATURE_POINTS {
            let weight = self.quadrature_weights[qp];
            let response = self.materials[qp]
                .evaluate(&data.deformation_gradient[qp])
                .map_err(|e| match e {
                    PliantError::Numerical(msg) => {
                        PliantError::Numerical(format!("element {}: {msg}", self.id.0))
                    }
                    other => other,
                })?;

            entry.energy += weight * response.energy_density;

            for (a, grad_a) in self.shape_gradients.iter().enumerate() {
                let force = response.stress * *grad_a * weight;
                entry.internal_force[3 * a] += force.x;
                entry.internal_force[3 * a + 1] += force.y;
                entry.internal_force[3 * a + 2] += force.z;
            }

            let tangent = &response.tangent;
            for (a, ga) in self.shape_gradients.iter().enumerate() {
                for (b, gb) in self.shape_gradients.iter().enumerate() {
                    for i in 0..3 {
                        for j in 0..3 {
                            let mut sum = 0.0;
                            for k in 0..3 {
                                let row = &tangent.data[vec_index(i, k)];
                                for l in 0..3 {
                                    sum += row[vec_index(j, l)] * ga[k] * gb[l];
                                }
                            }
                            entry.stiffness[3 * a + i][3 * b + j] += weight * sum;
                        }
                    }
                }
            }
        }

        Ok(entry)
    }
}
