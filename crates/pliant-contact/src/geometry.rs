//! Rigid collision geometry.
//!
//! Rigid shapes are owned by the rigid plant; the contact layer only needs
//! their pose, their velocity at the start of the step, and a signed
//! distance query. Half-spaces are unbounded and have no AABB.

use pliant_math::{DMat3, DQuat, DVec3};
use pliant_types::{GeometryId, PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An inverted box that any `grow` call replaces.
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::MAX),
            max: DVec3::splat(f64::MIN),
        }
    }

    pub fn from_points(points: &[DVec3]) -> Self {
        let mut aabb = Self::empty();
        for &p in points {
            aabb.grow(p);
        }
        aabb
    }

    pub fn grow(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn inflated(&self, margin: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(margin),
            max: self.max + DVec3::splat(margin),
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    pub fn center(&self) -> DVec3 {
        0.5 * (self.min + self.max)
    }

    pub fn half_extents(&self) -> DVec3 {
        0.5 * (self.max - self.min)
    }

    /// Signed distance from the plane `n·x = offset` to the closest
    /// point of the box (negative when the box straddles or lies below).
    pub fn plane_distance(&self, normal: DVec3, offset: f64) -> f64 {
        normal.dot(self.center()) - offset - self.half_extents().dot(normal.abs())
    }
}

/// Rigid pose: world-from-body rotation and translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            rotation: DQuat::IDENTITY,
        }
    }

    pub fn to_local(&self, world: DVec3) -> DVec3 {
        self.rotation.inverse() * (world - self.translation)
    }

    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.rotation * local + self.translation
    }
}

/// Collision shape in body coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Sphere { radius: f64 },
    Box { half_extents: DVec3 },
    /// The body-frame `z = 0` plane, solid below. Its outward normal is
    /// the body +z axis.
    HalfSpace,
}

impl Shape {
    pub fn validate(&self) -> PliantResult<()> {
        match *self {
            Self::Sphere { radius } if !(radius > 0.0 && radius.is_finite()) => Err(
                PliantError::InvalidConfig(format!("sphere radius must be positive, got {radius}")),
            ),
            Self::Box { half_extents } if !half_extents.cmpgt(DVec3::ZERO).all() => {
                Err(PliantError::InvalidConfig(format!(
                    "box half extents must be positive, got {half_extents}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Signed distance and outward unit normal in body coordinates.
    fn local_signed_distance(&self, p: DVec3) -> (f64, DVec3) {
        match *self {
            Self::Sphere { radius } => {
                let r = p.length();
                let normal = if r > 0.0 { p / r } else { DVec3::Z };
                (r - radius, normal)
            }
            Self::HalfSpace => (p.z, DVec3::Z),
            Self::Box { half_extents } => {
                let q = p.abs() - half_extents;
                let outside = q.max(DVec3::ZERO);
                let sign = DVec3::new(p.x.signum(), p.y.signum(), p.z.signum());
                if outside.length_squared() > 0.0 {
                    (outside.length(), (outside * sign).normalize())
                } else {
                    // Inside: push out through the nearest face.
                    let axis = if q.x >= q.y && q.x >= q.z {
                        DVec3::X
                    } else if q.y >= q.z {
                        DVec3::Y
                    } else {
                        DVec3::Z
                    };
                    (q.max_element(), axis * sign)
                }
            }
        }
    }
}

/// Inverse mass properties of a dynamic rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidMass {
    pub mass: f64,
    /// Rotational inertia about the body origin, in body coordinates.
    pub inertia: DMat3,
}

impl RigidMass {
    pub fn solid_sphere(mass: f64, radius: f64) -> Self {
        Self {
            mass,
            inertia: DMat3::from_diagonal(DVec3::splat(0.4 * mass * radius * radius)),
        }
    }

    pub fn solid_box(mass: f64, half_extents: DVec3) -> Self {
        let s = 4.0 * half_extents * half_extents;
        Self {
            mass,
            inertia: DMat3::from_diagonal(
                mass / 12.0 * DVec3::new(s.y + s.z, s.x + s.z, s.x + s.y),
            ),
        }
    }
}

/// One rigid collision geometry with the body state the contact layer reads.
///
/// The pose translation doubles as the body origin about which moments
/// are reported. A geometry without `mass` is kinematic (infinite mass).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidGeometry {
    pub id: GeometryId,
    pub shape: Shape,
    pub pose: Pose,
    pub linear_velocity: DVec3,
    pub angular_velocity: DVec3,
    pub mass: Option<RigidMass>,
}

impl RigidGeometry {
    /// A static (kinematic, motionless) geometry.
    pub fn fixed(id: GeometryId, shape: Shape, pose: Pose) -> Self {
        Self {
            id,
            shape,
            pose,
            linear_velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            mass: None,
        }
    }

    pub fn with_mass(mut self, mass: RigidMass) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn validate(&self) -> PliantResult<()> {
        self.shape.validate()?;
        if let Some(mass) = self.mass {
            if !(mass.mass > 0.0) || mass.inertia.determinant().abs() < f64::EPSILON {
                return Err(PliantError::InvalidConfig(format!(
                    "geometry {}: rigid mass and inertia must be positive",
                    self.id.0
                )));
            }
        }
        Ok(())
    }

    pub fn is_dynamic(&self) -> bool {
        self.mass.is_some()
    }

    /// Signed distance from the surface (negative inside) and the world
    /// normal pointing out of the rigid geometry.
    pub fn signed_distance(&self, point: DVec3) -> (f64, DVec3) {
        let (phi, normal) = self.shape.local_signed_distance(self.pose.to_local(point));
        (phi, self.pose.rotation * normal)
    }

    /// Velocity of the material point of this body at world position `point`.
    pub fn point_velocity(&self, point: DVec3) -> DVec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.pose.translation)
    }

    /// World AABB, or `None` for unbounded shapes.
    pub fn world_aabb(&self) -> Option<Aabb> {
        let half = match self.shape {
            Shape::Sphere { radius } => DVec3::splat(radius),
            Shape::Box { half_extents } => {
                let r = DMat3::from_quat(self.pose.rotation);
                DMat3::from_cols(r.x_axis.abs(), r.y_axis.abs(), r.z_axis.abs()) * half_extents
            }
            Shape::HalfSpace => return None,
        };
        Some(Aabb {
            min: self.pose.translation - half,
            max: self.pose.translation + half,
        })
    }

    /// Plane `n·x = offset` of a half-space geometry.
    pub fn half_space_plane(&self) -> Option<(DVec3, f64)> {
        match self.shape {
            Shape::HalfSpace => {
                let normal = self.pose.rotation * DVec3::Z;
                Some((normal, normal.dot(self.pose.translation)))
            }
            _ => None,
        }
    }

    /// Point of a surface triangle that reaches deepest into this geometry,
    /// with its barycentric coordinates. The triangle is wound so that
    /// `(b−a)×(c−a)` points out of the deformable body.
    ///
    /// Exact for spheres. For boxes the box's support point along the
    /// inward face normal is projected onto the triangle. Half-spaces
    /// return `None`: their distance is linear over a triangle, so the
    /// deepest point is always a corner.
    pub fn deepest_point_on_triangle(&self, triangle: &[DVec3; 3]) -> Option<(DVec3, [f64; 3])> {
        match self.shape {
            Shape::Sphere { .. } => Some(closest_point_on_triangle(self.pose.translation, triangle)),
            Shape::Box { half_extents } => {
                let [a, b, c] = *triangle;
                let outward = (b - a).cross(c - a).try_normalize()?;
                let inward_local = self.pose.rotation.inverse() * -outward;
                let corner = DVec3::new(
                    inward_local.x.signum(),
                    inward_local.y.signum(),
                    inward_local.z.signum(),
                ) * half_extents;
                Some(closest_point_on_triangle(self.pose.to_world(corner), triangle))
            }
            Shape::HalfSpace => None,
        }
    }

    /// Inverse inertia about the body origin in world coordinates.
    pub fn world_inverse_inertia(&self) -> Option<(f64, DMat3)> {
        let mass = self.mass?;
        let r = DMat3::from_quat(self.pose.rotation);
        let world = r * mass.inertia * r.transpose();
        Some((1.0 / mass.mass, world.inverse()))
    }
}

/// Closest point of triangle `abc` to `p`, with barycentric coordinates
/// `(u, v, w)` such that the point is `u a + v b + w c`.
pub fn closest_point_on_triangle(p: DVec3, triangle: &[DVec3; 3]) -> (DVec3, [f64; 3]) {
    let [a, b, c] = *triangle;
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, [1.0, 0.0, 0.0]);
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + v * ab, [1.0 - v, v, 0.0]);
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + w * ac, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && d4 - d3 >= 0.0 && d5 - d6 >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + w * (c - b), [0.0, 1.0 - w, w]);
    }

    let sum = va + vb + vc;
    if !(sum > 0.0) {
        // Degenerate triangle.
        return (a, [1.0, 0.0, 0.0]);
    }
    let v = vb / sum;
    let w = vc / sum;
    (a + v * ab + w * ac, [1.0 - v - w, v, w])
}
