//! Simulation configuration.
//!
//! One serializable document for everything a coupled simulation needs:
//! material, integrator, solver tolerances, contact settings, the time
//! step and gravity. Every section has defaults, so a TOML file only
//! needs the keys it changes.

use pliant_contact::PgsContactSolver;
use pliant_fem::{IntegrationScheme, NewmarkParameters, SolverConfig, StateUpdater};
use pliant_material::{MaterialModelKind, MaterialProperties};
use pliant_math::DVec3;
use pliant_types::constants::{DEFAULT_DT, DEFAULT_PROXIMITY_MARGIN, GRAVITY};
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// Contact discovery and resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Pairs closer than this are reported (meters).
    pub proximity_margin: f64,

    /// Coulomb friction coefficient shared by all pairs.
    pub friction_coefficient: f64,

    /// Sweep cap of the reference contact solver.
    pub max_solver_iterations: u32,

    /// Impulse-change tolerance of the reference contact solver.
    pub solver_tolerance: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            proximity_margin: DEFAULT_PROXIMITY_MARGIN,
            friction_coefficient: 0.5,
            max_solver_iterations: 200,
            solver_tolerance: 1e-10,
        }
    }
}

impl ContactConfig {
    pub fn validate(&self) -> PliantResult<()> {
        if !(self.proximity_margin >= 0.0 && self.proximity_margin.is_finite()) {
            return Err(PliantError::InvalidConfig(format!(
                "proximity margin must be non-negative, got {}",
                self.proximity_margin
            )));
        }
        if !(self.friction_coefficient >= 0.0 && self.friction_coefficient.is_finite()) {
            return Err(PliantError::InvalidConfig(format!(
                "friction coefficient must be non-negative, got {}",
                self.friction_coefficient
            )));
        }
        if self.max_solver_iterations == 0 || !(self.solver_tolerance > 0.0) {
            return Err(PliantError::InvalidConfig(
                "contact solver needs at least one sweep and a positive tolerance".into(),
            ));
        }
        Ok(())
    }

    /// The reference projected Gauss–Seidel solver with these settings.
    pub fn contact_solver(&self) -> PgsContactSolver {
        PgsContactSolver::new(self.max_solver_iterations, self.solver_tolerance)
    }
}

/// Top-level configuration of a coupled deformable/rigid simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time step (seconds).
    pub dt: f64,

    /// Gravitational acceleration (m/s²), z up.
    pub gravity: DVec3,

    /// Constitutive model of newly registered deformable bodies.
    pub model: MaterialModelKind,

    /// Integrator of the free-motion solve. Coupled bodies need a
    /// Newmark scheme.
    pub scheme: IntegrationScheme,

    /// Material of newly registered deformable bodies.
    pub material: MaterialProperties,

    pub newmark: NewmarkParameters,

    pub solver: SolverConfig,

    pub contact: ContactConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            gravity: DVec3::new(0.0, 0.0, -GRAVITY),
            model: MaterialModelKind::default(),
            scheme: IntegrationScheme::default(),
            material: MaterialProperties::default(),
            newmark: NewmarkParameters::default(),
            solver: SolverConfig::default(),
            contact: ContactConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> PliantResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| PliantError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> PliantResult<String> {
        toml::to_string(self).map_err(|e| PliantError::Serialization(e.to_string()))
    }

    /// Checks every section. Nothing is silently corrected.
    pub fn validate(&self) -> PliantResult<()> {
        self.material.validate()?;
        self.solver.validate()?;
        self.contact.validate()?;
        self.state_updater()?;
        if self.scheme == IntegrationScheme::ZerothOrder {
            return Err(PliantError::InvalidConfig(
                "coupled bodies need a Newmark scheme; zeroth order has no velocity unknown".into(),
            ));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(PliantError::InvalidConfig(format!(
                "time step must be positive, got {}",
                self.dt
            )));
        }
        if !self.gravity.is_finite() {
            return Err(PliantError::InvalidConfig(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        Ok(())
    }

    /// State updater for the configured scheme.
    pub fn state_updater(&self) -> PliantResult<StateUpdater> {
        StateUpdater::from_scheme(self.scheme, self.newmark)
    }
}
