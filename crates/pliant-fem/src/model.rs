//! Global assembly of residual and tangent for one deformable body.
//!
//! ```text
//! dynamic:      r = M a + D v + f_int(q) − f_ext
//! quasistatic:  r = f_int(q) − f_ext
//! tangent:      w_q K + w_v D + w_a M,   D = α M + β K
//! ```
//!
//! `M` is the lumped (diagonal) mass matrix and `f_ext` is gravity plus
//! user nodal loads. Elements are evaluated in parallel into the state's
//! cache; scatter-add into global vectors is serial.

use pliant_math::{CsrMatrix, DVec3, LinearOperator};
use pliant_material::{Material, MaterialModelKind, MaterialProperties};
use pliant_mesh::VolumeMesh;
use pliant_types::{ElementId, PliantError, PliantResult};
use rayon::prelude::*;

use crate::boundary::DirichletBoundaryCondition;
use crate::element::{FemElement, ELEMENT_DOFS};
use crate::state::{ElementCacheEntry, FemState};
use crate::state_updater::WeightedSum;

/// Elements, mass, loads and boundary conditions of one body.
#[derive(Debug, Clone)]
pub struct FemModel {
    elements: Vec<FemElement>,
    reference_positions: Vec<f64>,
    /// Lumped mass per DOF.
    mass: Vec<f64>,
    mass_damping: f64,
    stiffness_damping: f64,
    gravity: DVec3,
    external_force: Vec<f64>,
    dirichlet: DirichletBoundaryCondition,
}

impl FemModel {
    /// Builds one element per tetrahedron, all sharing one material.
    ///
    /// Gravity starts at zero; see [`FemModel::set_gravity`].
    pub fn from_mesh(
        mesh: &VolumeMesh,
        kind: MaterialModelKind,
        properties: &MaterialProperties,
    ) -> PliantResult<Self> {
        mesh.validate()?;
        let material = Material::new(kind, properties)?;
        let n = mesh.vertex_count();

        let elements = mesh
            .tetrahedra
            .iter()
            .enumerate()
            .map(|(e, tet)| {
                FemElement::new(
                    ElementId(e as u32),
                    *tet,
                    &mesh.element_positions(e),
                    material,
                    properties.mass_density,
                    n,
                )
            })
            .collect::<PliantResult<Vec<_>>>()?;

        let mut mass = vec![0.0; 3 * n];
        for element in &elements {
            for &v in element.vertices() {
                for d in 0..3 {
                    mass[3 * v + d] += element.lumped_mass();
                }
            }
        }

        Ok(Self {
            elements,
            reference_positions: mesh.positions_flat(),
            mass,
            mass_damping: properties.mass_damping,
            stiffness_damping: properties.stiffness_damping,
            gravity: DVec3::ZERO,
            external_force: vec![0.0; 3 * n],
            dirichlet: DirichletBoundaryCondition::new(),
        })
    }

    /// A state at rest in the reference configuration.
    pub fn make_state(&self) -> FemState {
        FemState::at_rest(self.reference_positions.clone(), self.elements.len())
    }

    pub fn num_dofs(&self) -> usize {
        self.reference_positions.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.reference_positions.len() / 3
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[FemElement] {
        &self.elements
    }

    /// Lumped mass per DOF.
    pub fn lumped_mass(&self) -> &[f64] {
        &self.mass
    }

    /// Total mass of the body.
    pub fn total_mass(&self) -> f64 {
        self.mass.iter().step_by(3).sum()
    }

    pub fn reference_positions(&self) -> &[f64] {
        &self.reference_positions
    }

    pub fn gravity(&self) -> DVec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: DVec3) {
        self.gravity = gravity;
    }

    /// Sets the nodal load on `vertex`, replacing any previous load.
    pub fn set_external_force(&mut self, vertex: usize, force: DVec3) -> PliantResult<()> {
        if vertex >= self.num_vertices() {
            return Err(PliantError::InvalidConfig(format!(
                "external force on vertex {vertex}, but the body has {} vertices",
                self.num_vertices()
            )));
        }
        for d in 0..3 {
            self.external_force[3 * vertex + d] = force[d];
        }
        Ok(())
    }

    pub fn clear_external_forces(&mut self) {
        self.external_force.fill(0.0);
    }

    /// Installs Dirichlet conditions, replacing the previous set.
    pub fn set_dirichlet_boundary_condition(
        &mut self,
        bc: DirichletBoundaryCondition,
    ) -> PliantResult<()> {
        bc.validate(self.num_dofs())?;
        self.dirichlet = bc;
        Ok(())
    }

    pub fn dirichlet_boundary_condition(&self) -> &DirichletBoundaryCondition {
        &self.dirichlet
    }

    /// Writes the prescribed values into `state`.
    pub fn apply_boundary_condition(&self, state: &mut FemState) {
        self.dirichlet.apply_to_state(state);
    }

    fn check_state(&self, state: &FemState) -> PliantResult<()> {
        if state.num_dofs() != self.num_dofs() {
            return Err(PliantError::InvalidConfig(format!(
                "state has {} DOFs, model has {}",
                state.num_dofs(),
                self.num_dofs()
            )));
        }
        if state.num_elements() != self.elements.len() {
            return Err(PliantError::InvalidConfig(format!(
                "state caches {} elements, model has {}",
                state.num_elements(),
                self.elements.len()
            )));
        }
        Ok(())
    }

    /// Re-evaluates every element whose cache entry is stale.
    pub fn refresh_cache(&self, state: &mut FemState) -> PliantResult<()> {
        self.check_state(state)?;
        let (q, v, generation, cache) = state.cache_parts();
        cache
            .par_iter_mut()
            .zip(self.elements.par_iter())
            .try_for_each(|(entry, element)| {
                if entry.stamp != Some(generation) {
                    *entry = element.evaluate(q, v, generation)?;
                }
                Ok(())
            })
    }

    /// Total strain energy at the current state.
    pub fn calc_elastic_energy(&self, state: &mut FemState) -> PliantResult<f64> {
        self.refresh_cache(state)?;
        Ok(state.cache().iter().map(|entry| entry.energy).sum())
    }

    /// `f_int(q)` (no boundary conditions applied).
    pub fn calc_internal_force(&self, state: &mut FemState) -> PliantResult<Vec<f64>> {
        self.refresh_cache(state)?;
        let mut force = vec![0.0; self.num_dofs()];
        for (element, entry) in self.elements.iter().zip(state.cache()) {
            for local in 0..ELEMENT_DOFS {
                force[element.global_dof(local)] += entry.internal_force[local];
            }
        }
        Ok(force)
    }

    /// Gravity plus nodal loads.
    pub fn calc_external_force(&self) -> Vec<f64> {
        let mut force = self.external_force.clone();
        for (i, f) in force.iter_mut().enumerate() {
            *f += self.mass[i] * self.gravity[i % 3];
        }
        force
    }

    /// Dynamic residual `M a + D v + f_int − f_ext`, zero on prescribed DOFs.
    pub fn calc_residual(&self, state: &mut FemState) -> PliantResult<Vec<f64>> {
        let mut residual = self.calc_internal_force(state)?;
        let external = self.calc_external_force();

        // β K v: reuse the cached element stiffness.
        let mut kv = vec![0.0; self.num_dofs()];
        if self.stiffness_damping != 0.0 {
            let v = state.v();
            for (element, entry) in self.elements.iter().zip(state.cache()) {
                scatter_mul(element, entry, v, &mut kv);
            }
        }

        let (a, v) = (state.a(), state.v());
        for i in 0..residual.len() {
            residual[i] += self.mass[i] * a[i]
                + self.mass_damping * self.mass[i] * v[i]
                + self.stiffness_damping * kv[i]
                - external[i];
        }
        self.dirichlet.apply_to_residual(&mut residual);
        Ok(residual)
    }

    /// Quasistatic residual `f_int − f_ext`, zero on prescribed DOFs.
    pub fn calc_static_residual(&self, state: &mut FemState) -> PliantResult<Vec<f64>> {
        let mut residual = self.calc_internal_force(state)?;
        for (r, f) in residual.iter_mut().zip(self.calc_external_force()) {
            *r -= f;
        }
        self.dirichlet.apply_to_residual(&mut residual);
        Ok(residual)
    }

    /// Assembled tangent `w_q K + w_v D + w_a M` with identity rows and
    /// columns on prescribed DOFs.
    pub fn calc_tangent_matrix(
        &self,
        state: &mut FemState,
        weights: &WeightedSum,
    ) -> PliantResult<CsrMatrix> {
        self.refresh_cache(state)?;
        let (k_weight, m_weight) = self.matrix_weights(weights);
        let n = self.num_dofs();

        let mut triplets = Vec::with_capacity(n + self.elements.len() * ELEMENT_DOFS * ELEMENT_DOFS);
        // Diagonal is always stored, even when the mass weight is zero.
        for (i, &m) in self.mass.iter().enumerate() {
            triplets.push((i, i, m_weight * m));
        }
        for (element, entry) in self.elements.iter().zip(state.cache()) {
            for (r, row) in entry.stiffness.iter().enumerate() {
                let gr = element.global_dof(r);
                for (c, &value) in row.iter().enumerate() {
                    triplets.push((gr, element.global_dof(c), k_weight * value));
                }
            }
        }

        let mut tangent = CsrMatrix::from_triplets(n, n, &triplets);
        self.dirichlet.apply_to_tangent(&mut tangent);
        Ok(tangent)
    }

    /// Matrix-free view of the same tangent as [`FemModel::calc_tangent_matrix`].
    pub fn tangent_operator<'a>(
        &'a self,
        state: &'a mut FemState,
        weights: &WeightedSum,
    ) -> PliantResult<TangentOperator<'a>> {
        self.refresh_cache(state)?;
        let (stiffness_weight, mass_weight) = self.matrix_weights(weights);
        Ok(TangentOperator {
            model: self,
            cache: state.cache(),
            stiffness_weight,
            mass_weight,
            constrained: self.dirichlet.mask(self.num_dofs()),
        })
    }

    /// Folds Rayleigh damping into separate K and M weights.
    fn matrix_weights(&self, w: &WeightedSum) -> (f64, f64) {
        (
            w.w_q + w.w_v * self.stiffness_damping,
            w.w_a + w.w_v * self.mass_damping,
        )
    }
}

/// `out += K_e · x` for one element.
fn scatter_mul(element: &FemElement, entry: &ElementCacheEntry, x: &[f64], out: &mut [f64]) {
    let mut local = [0.0; ELEMENT_DOFS];
    for (c, value) in local.iter_mut().enumerate() {
        *value = x[element.global_dof(c)];
    }
    for (r, row) in entry.stiffness.iter().enumerate() {
        let sum: f64 = row.iter().zip(&local).map(|(k, x)| k * x).sum();
        out[element.global_dof(r)] += sum;
    }
}

/// Tangent applied element by element, never assembled.
pub struct TangentOperator<'a> {
    model: &'a FemModel,
    cache: &'a [ElementCacheEntry],
    stiffness_weight: f64,
    mass_weight: f64,
    constrained: Vec<bool>,
}

impl LinearOperator for TangentOperator<'_> {
    fn dimension(&self) -> usize {
        self.constrained.len()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        let masked: Vec<f64> = x
            .iter()
            .zip(&self.constrained)
            .map(|(&xi, &fixed)| if fixed { 0.0 } else { xi })
            .collect();

        let mut kx = vec![0.0; y.len()];
        for (element, entry) in self.model.elements.iter().zip(self.cache) {
            scatter_mul(element, entry, &masked, &mut kx);
        }

        for i in 0..y.len() {
            y[i] = if self.constrained[i] {
                x[i]
            } else {
                self.stiffness_weight * kx[i] + self.mass_weight * self.model.mass[i] * masked[i]
            };
        }
    }

    fn diagonal(&self) -> Option<Vec<f64>> {
        let mut diag: Vec<f64> = self.model.mass.iter().map(|m| self.mass_weight * m).collect();
        for (element, entry) in self.model.elements.iter().zip(self.cache) {
            for local in 0..ELEMENT_DOFS {
                diag[element.global_dof(local)] += self.stiffness_weight * entry.stiffness[local][local];
            }
        }
        for (d, &fixed) in diag.iter_mut().zip(&self.constrained) {
            if fixed {
                *d = 1.0;
            }
        }
        Some(diag)
    }
}
