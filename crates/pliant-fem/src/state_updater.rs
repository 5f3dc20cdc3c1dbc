//! Time-integration schemes expressed as state updaters.
//!
//! A scheme picks one unknown `z` (a, v or q at step n+1) and expresses the
//! other two as affine functions of it. The Newton solver only ever sees
//! `z`; the updater turns an increment `dz` into `(Δq, Δv, Δa)` and
//! supplies the weights `(∂q/∂z, ∂v/∂z, ∂a/∂z)` that combine the stiffness,
//! damping and mass matrices into the tangent.
//!
//! ```text
//! v_{n+1} = v_n + dt[(1−γ) a_n + γ a_{n+1}]
//! q_{n+1} = q_n + dt v_n + dt²[(½−β) a_n + β a_{n+1}]
//! ```

use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

use crate::config::{IntegrationScheme, NewmarkParameters};
use crate::state::FemState;

/// Weights `(w_q, w_v, w_a)` of the tangent `w_q K + w_v D + w_a M`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedSum {
    pub w_q: f64,
    pub w_v: f64,
    pub w_a: f64,
}

impl WeightedSum {
    /// Weights of a quasistatic solve: stiffness only.
    pub const STATIC: Self = Self {
        w_q: 1.0,
        w_v: 0.0,
        w_a: 0.0,
    };

    pub fn as_array(&self) -> [f64; 3] {
        [self.w_q, self.w_v, self.w_a]
    }
}

/// Closed set of integration schemes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StateUpdater {
    /// Newmark-β with unknown a_{n+1}.
    AccelerationNewmark(NewmarkParameters),
    /// Newmark-β with unknown v_{n+1}. Requires γ > 0.
    VelocityNewmark(NewmarkParameters),
    /// Unknown q_{n+1}; v and a are held.
    ZerothOrder,
}

impl StateUpdater {
    /// Validated acceleration-form Newmark updater.
    pub fn acceleration_newmark(params: NewmarkParameters) -> PliantResult<Self> {
        params.validate()?;
        Ok(Self::AccelerationNewmark(params))
    }

    /// Validated velocity-form Newmark updater.
    ///
    /// # Errors
    /// `InvalidConfig` for out-of-range parameters or γ = 0.
    pub fn velocity_newmark(params: NewmarkParameters) -> PliantResult<Self> {
        params.validate()?;
        if params.gamma <= 0.0 {
            return Err(PliantError::InvalidConfig(
                "velocity-form Newmark requires gamma > 0".into(),
            ));
        }
        Ok(Self::VelocityNewmark(params))
    }

    /// Builds the updater for a configured scheme.
    pub fn from_scheme(scheme: IntegrationScheme, params: NewmarkParameters) -> PliantResult<Self> {
        match scheme {
            IntegrationScheme::AccelerationNewmark => Self::acceleration_newmark(params),
            IntegrationScheme::VelocityNewmark => Self::velocity_newmark(params),
            IntegrationScheme::ZerothOrder => Ok(Self::ZerothOrder),
        }
    }

    pub fn scheme(&self) -> IntegrationScheme {
        match self {
            Self::AccelerationNewmark(_) => IntegrationScheme::AccelerationNewmark,
            Self::VelocityNewmark(_) => IntegrationScheme::VelocityNewmark,
            Self::ZerothOrder => IntegrationScheme::ZerothOrder,
        }
    }

    /// Re-checks the parameter invariants (e.g. after deserialization).
    pub fn validate(&self) -> PliantResult<()> {
        match *self {
            Self::AccelerationNewmark(p) => Self::acceleration_newmark(p).map(|_| ()),
            Self::VelocityNewmark(p) => Self::velocity_newmark(p).map(|_| ()),
            Self::ZerothOrder => Ok(()),
        }
    }

    /// `(∂q/∂z, ∂v/∂z, ∂a/∂z)` for time step `dt`.
    pub fn weights(&self, dt: f64) -> WeightedSum {
        match *self {
            Self::AccelerationNewmark(NewmarkParameters { beta, gamma }) => WeightedSum {
                w_q: beta * dt * dt,
                w_v: gamma * dt,
                w_a: 1.0,
            },
            Self::VelocityNewmark(NewmarkParameters { beta, gamma }) => WeightedSum {
                w_q: beta * dt / gamma,
                w_v: 1.0,
                w_a: 1.0 / (gamma * dt),
            },
            Self::ZerothOrder => WeightedSum::STATIC,
        }
    }

    /// The unknown `z` of this scheme.
    pub fn unknown<'a>(&self, state: &'a FemState) -> &'a [f64] {
        match self {
            Self::AccelerationNewmark(_) => state.a(),
            Self::VelocityNewmark(_) => state.v(),
            Self::ZerothOrder => state.q(),
        }
    }

    /// Applies `Δq = w_q dz, Δv = w_v dz, Δa = w_a dz`.
    pub fn update_state(&self, state: &mut FemState, dz: &[f64], dt: f64) -> PliantResult<()> {
        if dz.len() != state.num_dofs() {
            return Err(PliantError::InvalidConfig(format!(
                "increment length ({}) != DOF count ({})",
                dz.len(),
                state.num_dofs()
            )));
        }
        let w = self.weights(dt);
        state.increment(w.w_q, w.w_v, w.w_a, dz);
        Ok(())
    }

    /// Predictor for step n+1 built from the converged state of step n.
    ///
    /// The unknown is held at its previous value and the other two
    /// quantities follow from the scheme's relations. The returned state
    /// shares no cache validity with `prev`.
    pub fn advance_one_time_step(&self, prev: &FemState, dt: f64) -> FemState {
        let (q0, v0, a0) = (prev.q(), prev.v(), prev.a());
        let n = q0.len();
        let mut q = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut a = vec![0.0; n];

        match *self {
            Self::AccelerationNewmark(_) => {
                for i in 0..n {
                    a[i] = a0[i];
                    v[i] = v0[i] + dt * a0[i];
                    q[i] = q0[i] + dt * v0[i] + 0.5 * dt * dt * a0[i];
                }
            }
            Self::VelocityNewmark(NewmarkParameters { beta, gamma }) => {
                for i in 0..n {
                    v[i] = v0[i];
                    a[i] = -(1.0 - gamma) / gamma * a0[i];
                    q[i] = q0[i] + dt * v0[i] + dt * dt * ((0.5 - beta) * a0[i] + beta * a[i]);
                }
            }
            Self::ZerothOrder => {
                q.copy_from_slice(q0);
                v.copy_from_slice(v0);
                a.copy_from_slice(a0);
            }
        }

        let mut next = prev.clone();
        next.overwrite(q, v, a);
        next
    }
}
