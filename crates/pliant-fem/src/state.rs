//! FEM state: generalized positions, velocities, accelerations and the
//! per-element evaluation cache.
//!
//! The vectors are private. They change only through the state updater
//! and Dirichlet application, and every change bumps `generation`, which
//! lazily invalidates all cache entries.

use pliant_math::{DMat3, DVec3};
use pliant_mesh::VolumeMesh;
use pliant_types::{PliantError, PliantResult};

use crate::element::{ELEMENT_DOFS, QUADRATURE_POINTS};

/// Deformation gradient and its rate at each quadrature point.
#[derive(Debug, Clone, Copy)]
pub struct DeformationGradientData {
    pub deformation_gradient: [DMat3; QUADRATURE_POINTS],
    pub deformation_gradient_dot: [DMat3; QUADRATURE_POINTS],
}

impl Default for DeformationGradientData {
    fn default() -> Self {
        Self {
            deformation_gradient: [DMat3::IDENTITY; QUADRATURE_POINTS],
            deformation_gradient_dot: [DMat3::ZERO; QUADRATURE_POINTS],
        }
    }
}

/// Cached evaluation of one element.
///
/// Valid iff `stamp == Some(state.generation())`.
#[derive(Debug, Clone)]
pub struct ElementCacheEntry {
    pub stamp: Option<u64>,
    pub deformation: DeformationGradientData,
    /// Strain energy V·Ψ.
    pub energy: f64,
    /// Internal force ∂E/∂x over the 12 element DOFs.
    pub internal_force: [f64; ELEMENT_DOFS],
    /// Stiffness ∂²E/∂x² over the 12 element DOFs.
    pub stiffness: [[f64; ELEMENT_DOFS]; ELEMENT_DOFS],
}

impl Default for ElementCacheEntry {
    fn default() -> Self {
        Self {
            stamp: None,
            deformation: DeformationGradientData::default(),
            energy: 0.0,
            internal_force: [0.0; ELEMENT_DOFS],
            stiffness: [[0.0; ELEMENT_DOFS]; ELEMENT_DOFS],
        }
    }
}

/// State of one deformable body.
#[derive(Debug, Clone)]
pub struct FemState {
    q: Vec<f64>,
    v: Vec<f64>,
    a: Vec<f64>,
    generation: u64,
    cache: Vec<ElementCacheEntry>,
}

impl FemState {
    /// Creates a state at rest at positions `q`.
    pub fn new(q: Vec<f64>, num_elements: usize) -> PliantResult<Self> {
        if q.len() % 3 != 0 {
            return Err(PliantError::InvalidConfig(format!(
                "position vector length {} is not a multiple of 3",
                q.len()
            )));
        }
        Ok(Self::at_rest(q, num_elements))
    }

    /// Creates a state at rest in the mesh's reference configuration.
    pub fn from_mesh(mesh: &VolumeMesh) -> Self {
        Self::at_rest(mesh.positions_flat(), mesh.element_count())
    }

    pub(crate) fn at_rest(q: Vec<f64>, num_elements: usize) -> Self {
        let n = q.len();
        Self {
            q,
            v: vec![0.0; n],
            a: vec![0.0; n],
            generation: 0,
            cache: vec![ElementCacheEntry::default(); num_elements],
        }
    }

    /// Replaces the initial velocities.
    pub fn with_velocities(mut self, v: Vec<f64>) -> PliantResult<Self> {
        check_len("velocity", v.len(), self.q.len())?;
        self.v = v;
        self.bump();
        Ok(self)
    }

    /// Replaces the initial accelerations.
    pub fn with_accelerations(mut self, a: Vec<f64>) -> PliantResult<Self> {
        check_len("acceleration", a.len(), self.q.len())?;
        self.a = a;
        self.bump();
        Ok(self)
    }

    #[inline]
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    #[inline]
    pub fn v(&self) -> &[f64] {
        &self.v
    }

    #[inline]
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Number of generalized coordinates (3 per vertex).
    #[inline]
    pub fn num_dofs(&self) -> usize {
        self.q.len()
    }

    /// Number of element cache entries.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.cache.len()
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.q.len() / 3
    }

    /// Counter bumped by every state mutation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Position of vertex `i`.
    pub fn position(&self, i: usize) -> DVec3 {
        DVec3::new(self.q[3 * i], self.q[3 * i + 1], self.q[3 * i + 2])
    }

    /// Velocity of vertex `i`.
    pub fn velocity(&self, i: usize) -> DVec3 {
        DVec3::new(self.v[3 * i], self.v[3 * i + 1], self.v[3 * i + 2])
    }

    /// True if the cache entry of element `e` matches the current state.
    pub fn is_cache_valid(&self, e: usize) -> bool {
        self.cache
            .get(e)
            .is_some_and(|entry| entry.stamp == Some(self.generation))
    }

    /// The cache entry of element `e`, if it is valid.
    pub fn cached_entry(&self, e: usize) -> Option<&ElementCacheEntry> {
        self.cache
            .get(e)
            .filter(|entry| entry.stamp == Some(self.generation))
    }

    pub(crate) fn cache(&self) -> &[ElementCacheEntry] {
        &self.cache
    }

    /// Splits borrows so elements can read `q, v` while writing the cache.
    pub(crate) fn cache_parts(&mut self) -> (&[f64], &[f64], u64, &mut [ElementCacheEntry]) {
        (&self.q, &self.v, self.generation, &mut self.cache)
    }

    /// `q += w_q·dz, v += w_v·dz, a += w_a·dz`, one generation bump.
    pub(crate) fn increment(&mut self, w_q: f64, w_v: f64, w_a: f64, dz: &[f64]) {
        for (i, dzi) in dz.iter().enumerate() {
            self.q[i] += w_q * dzi;
            self.v[i] += w_v * dzi;
            self.a[i] += w_a * dzi;
        }
        self.bump();
    }

    /// Overwrites all three vectors, one generation bump.
    pub(crate) fn overwrite(&mut self, q: Vec<f64>, v: Vec<f64>, a: Vec<f64>) {
        self.q = q;
        self.v = v;
        self.a = a;
        self.bump();
    }

    /// Sets DOF `dof` to `(value, rate, 0)` without bumping.
    pub(crate) fn prescribe(&mut self, dof: usize, value: f64, rate: f64) {
        self.q[dof] = value;
        self.v[dof] = rate;
        self.a[dof] = 0.0;
    }

    pub(crate) fn bump(&mut self) {
        self.generation += 1;
    }
}

fn check_len(what: &str, got: usize, expected: usize) -> PliantResult<()> {
    if got != expected {
        return Err(PliantError::InvalidConfig(format!(
            "{what} vector length ({got}) != DOF count ({expected})"
        )));
    }
    Ok(())
}
