//! Rigid-body plant seam.
//!
//! The rigid side of a coupled simulation is owned by someone else: it
//! integrates its own dynamics and resolves its own rigid/rigid contact.
//! The manager only reads collision geometry and hands back the contact
//! impulses the deformable bodies exert.

use pliant_contact::{Pose, RigidGeometry, Shape};
use pliant_math::{DQuat, DVec3};
use pliant_types::{GeometryId, PliantError, PliantResult};

/// Trait for rigid-body plants driven alongside deformable bodies.
///
/// # Implementations
/// - `KinematicRigidWorld` — Geometry moving with prescribed velocities
pub trait RigidBodyPlant {
    /// Collision geometries with pose and velocity at the start of the step.
    fn geometries(&self) -> &[RigidGeometry];

    /// Applies a world-frame impulse at a world point to the body that
    /// owns `geometry`. Called after the deformable states of the step
    /// are final, before [`RigidBodyPlant::advance`].
    fn apply_contact_impulse(
        &mut self,
        geometry: GeometryId,
        point: DVec3,
        impulse: DVec3,
    ) -> PliantResult<()>;

    /// Advances the rigid dynamics by `dt`.
    fn advance(&mut self, dt: f64) -> PliantResult<()>;

    /// Returns the plant name.
    fn name(&self) -> &str;
}

/// Rigid geometry that moves with prescribed velocities.
///
/// Kinematic bodies have infinite mass: contact impulses do not change
/// their motion. They are accumulated per geometry so callers can read
/// the reaction (e.g. the load on a floor).
#[derive(Debug, Clone, Default)]
pub struct KinematicRigidWorld {
    geometries: Vec<RigidGeometry>,
    /// Accumulated impulse and angular impulse about the geometry origin.
    received: Vec<(DVec3, DVec3)>,
}

impl KinematicRigidWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a motionless geometry and returns its id.
    pub fn add_geometry(&mut self, shape: Shape, pose: Pose) -> PliantResult<GeometryId> {
        let id = GeometryId(self.geometries.len() as u32);
        let geometry = RigidGeometry::fixed(id, shape, pose);
        geometry.validate()?;
        self.geometries.push(geometry);
        self.received.push((DVec3::ZERO, DVec3::ZERO));
        Ok(id)
    }

    /// Ground plane `z = height` with +z outward normal.
    pub fn add_ground(&mut self, height: f64) -> PliantResult<GeometryId> {
        self.add_geometry(
            Shape::HalfSpace,
            Pose::from_translation(DVec3::new(0.0, 0.0, height)),
        )
    }

    /// Prescribes the linear and angular velocity of a geometry.
    pub fn set_velocity(
        &mut self,
        id: GeometryId,
        linear: DVec3,
        angular: DVec3,
    ) -> PliantResult<()> {
        let geometry = self.geometry_mut(id)?;
        geometry.linear_velocity = linear;
        geometry.angular_velocity = angular;
        Ok(())
    }

    pub fn geometry(&self, id: GeometryId) -> PliantResult<&RigidGeometry> {
        self.geometries
            .get(id.index())
            .ok_or_else(|| PliantError::InvalidConfig(format!("unknown rigid geometry {}", id.0)))
    }

    fn geometry_mut(&mut self, id: GeometryId) -> PliantResult<&mut RigidGeometry> {
        self.geometries
            .get_mut(id.index())
            .ok_or_else(|| PliantError::InvalidConfig(format!("unknown rigid geometry {}", id.0)))
    }

    /// Total impulse received by a geometry since the last reset.
    pub fn received_impulse(&self, id: GeometryId) -> PliantResult<DVec3> {
        self.received
            .get(id.index())
            .map(|(linear, _)| *linear)
            .ok_or_else(|| PliantError::InvalidConfig(format!("unknown rigid geometry {}", id.0)))
    }

    /// Total angular impulse about the geometry origin since the last reset.
    pub fn received_angular_impulse(&self, id: GeometryId) -> PliantResult<DVec3> {
        self.received
            .get(id.index())
            .map(|(_, angular)| *angular)
            .ok_or_else(|| PliantError::InvalidConfig(format!("unknown rigid geometry {}", id.0)))
    }

    pub fn reset_received_impulses(&mut self) {
        self.received.fill((DVec3::ZERO, DVec3::ZERO));
    }
}

impl RigidBodyPlant for KinematicRigidWorld {
    fn geometries(&self) -> &[RigidGeometry] {
        &self.geometries
    }

    fn apply_contact_impulse(
        &mut self,
        geometry: GeometryId,
        point: DVec3,
        impulse: DVec3,
    ) -> PliantResult<()> {
        let origin = self.geometry(geometry)?.pose.translation;
        let (linear, angular) = &mut self.received[geometry.index()];
        *linear += impulse;
        *angular += (point - origin).cross(impulse);
        Ok(())
    }

    fn advance(&mut self, dt: f64) -> PliantResult<()> {
        for geometry in &mut self.geometries {
            let pose = &mut geometry.pose;
            pose.translation += dt * geometry.linear_velocity;
            let spin = DQuat::from_scaled_axis(dt * geometry.angular_velocity);
            pose.rotation = (spin * pose.rotation).normalize();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "kinematic_rigid_world"
    }
}
