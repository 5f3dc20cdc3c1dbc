//! Dirichlet boundary conditions.
//!
//! Prescribes the position and rate of individual DOFs. The model zeroes
//! the residual and replaces tangent rows/columns of prescribed DOFs with
//! the identity, so Newton increments on them are exactly zero.

use std::collections::BTreeMap;

use pliant_math::{CsrMatrix, DVec3};
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

use crate::state::FemState;

/// Prescribed value and time derivative of one DOF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirichletValue {
    pub value: f64,
    pub rate: f64,
}

/// Set of prescribed DOFs. Indices are unique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirichletBoundaryCondition {
    conditions: BTreeMap<usize, DirichletValue>,
}

impl DirichletBoundaryCondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prescribes `dof` to `value` moving at `rate`.
    ///
    /// # Errors
    /// `InvalidConfig` if `dof` is already prescribed.
    pub fn add_boundary_condition(&mut self, dof: usize, value: f64, rate: f64) -> PliantResult<()> {
        if self.conditions.contains_key(&dof) {
            return Err(PliantError::InvalidConfig(format!(
                "DOF {dof} already has a Dirichlet condition"
            )));
        }
        self.conditions.insert(dof, DirichletValue { value, rate });
        Ok(())
    }

    /// Clamps all three DOFs of `vertex` at `position`.
    pub fn fix_vertex(&mut self, vertex: usize, position: DVec3) -> PliantResult<()> {
        for d in 0..3 {
            self.add_boundary_condition(3 * vertex + d, position[d], 0.0)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.conditions.contains_key(&dof)
    }

    /// Prescribed DOFs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, DirichletValue)> + '_ {
        self.conditions.iter().map(|(&dof, &value)| (dof, value))
    }

    /// Per-DOF flag, `true` where prescribed.
    pub fn mask(&self, num_dofs: usize) -> Vec<bool> {
        let mut mask = vec![false; num_dofs];
        for &dof in self.conditions.keys() {
            if dof < num_dofs {
                mask[dof] = true;
            }
        }
        mask
    }

    /// Checks every index against the DOF count.
    pub fn validate(&self, num_dofs: usize) -> PliantResult<()> {
        match self.conditions.keys().next_back() {
            Some(&dof) if dof >= num_dofs => Err(PliantError::InvalidConfig(format!(
                "Dirichlet DOF {dof} is out of range (DOF count: {num_dofs})"
            ))),
            _ => Ok(()),
        }
    }

    /// Writes `q = value, v = rate, a = 0` for every prescribed DOF.
    pub fn apply_to_state(&self, state: &mut FemState) {
        if self.conditions.is_empty() {
            return;
        }
        for (&dof, c) in &self.conditions {
            state.prescribe(dof, c.value, c.rate);
        }
        state.bump();
    }

    /// Zeroes residual entries of prescribed DOFs.
    pub fn apply_to_residual(&self, residual: &mut [f64]) {
        for &dof in self.conditions.keys() {
            residual[dof] = 0.0;
        }
    }

    /// Replaces prescribed rows and columns by the identity.
    pub fn apply_to_tangent(&self, tangent: &mut CsrMatrix) {
        if !self.conditions.is_empty() {
            tangent.replace_with_identity(&self.mask(tangent.rows));
        }
    }
}
