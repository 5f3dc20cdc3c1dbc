//! Rigid/deformable contact discovery.
//!
//! Broad phase: the body's element BVH is refit to the current positions
//! and culled against each rigid geometry's AABB inflated by the
//! proximity margin (half-spaces use a box-vs-plane test instead).
//! Narrow phase: the rigid signed distance is sampled at every boundary
//! vertex of the surviving elements, and at the deepest point of each of
//! their boundary faces.

use pliant_math::DVec3;
use pliant_mesh::{VolumeMesh, VolumeTopology};
use pliant_types::{BodyId, ElementId, PliantError, PliantResult};

use crate::bvh::{element_boxes, Bvh};
use crate::contact::{contact_frame, ContactPair, DeformableContactData};
use crate::geometry::RigidGeometry;

/// Barycentric weight above which a face point counts as its corner.
const CORNER_TOLERANCE: f64 = 1e-9;

/// A face point must be this much deeper than the face corners.
const DEPTH_TOLERANCE: f64 = 1e-9;

/// Face points closer than this are one contact.
const DUPLICATE_DISTANCE: f64 = 1e-9;

/// Collision data kept for one registered deformable body.
#[derive(Debug, Clone)]
struct DeformableGeometry {
    tetrahedra: Vec<[usize; 4]>,
    topology: VolumeTopology,
    bvh: Bvh,
    num_vertices: usize,
}

/// Finds contacts between registered deformable bodies and rigid geometries.
#[derive(Debug, Clone)]
pub struct ContactDetector {
    proximity_margin: f64,
    bodies: Vec<DeformableGeometry>,
}

impl ContactDetector {
    /// Creates a detector reporting pairs closer than `proximity_margin`.
    pub fn new(proximity_margin: f64) -> PliantResult<Self> {
        if !(proximity_margin >= 0.0 && proximity_margin.is_finite()) {
            return Err(PliantError::InvalidConfig(format!(
                "proximity margin must be non-negative, got {proximity_margin}"
            )));
        }
        Ok(Self {
            proximity_margin,
            bodies: Vec::new(),
        })
    }

    pub fn proximity_margin(&self) -> f64 {
        self.proximity_margin
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Registers a deformable body in its reference configuration.
    pub fn register_deformable_body(&mut self, mesh: &VolumeMesh) -> BodyId {
        let id = BodyId(self.bodies.len() as u32);
        self.bodies.push(DeformableGeometry {
            tetrahedra: mesh.tetrahedra.clone(),
            topology: VolumeTopology::build(mesh),
            bvh: Bvh::from_positions(mesh, &mesh.positions_flat()),
            num_vertices: mesh.vertex_count(),
        });
        id
    }

    /// Detects all contacts of `body` at flattened positions `q`.
    ///
    /// Pairs are ordered by geometry (in the order given); within a
    /// geometry vertex contacts come first (by vertex), then face
    /// contacts (by face).
    pub fn detect(
        &mut self,
        body: BodyId,
        q: &[f64],
        rigid: &[RigidGeometry],
    ) -> PliantResult<DeformableContactData> {
        let margin = self.proximity_margin;
        let geometry = self.bodies.get_mut(body.index()).ok_or_else(|| {
            PliantError::InvalidConfig(format!("unknown deformable body {}", body.0))
        })?;
        if q.len() != 3 * geometry.num_vertices {
            return Err(PliantError::InvalidConfig(format!(
                "body {}: expected {} position DOFs, got {}",
                body.0,
                3 * geometry.num_vertices,
                q.len()
            )));
        }

        geometry
            .bvh
            .refit(&element_boxes(&geometry.tetrahedra, q));

        let mut data = DeformableContactData::new(body);
        let mut candidate = vec![false; geometry.num_vertices];
        let mut queried = vec![false; geometry.tetrahedra.len()];
        let mut vertex_separation = vec![f64::INFINITY; geometry.num_vertices];

        for rigid_geometry in rigid {
            let elements = match rigid_geometry.half_space_plane() {
                Some((normal, offset)) => geometry
                    .bvh
                    .query(|aabb| aabb.plane_distance(normal, offset) <= margin),
                None => match rigid_geometry.world_aabb() {
                    Some(aabb) => geometry.bvh.query_aabb(&aabb.inflated(margin)),
                    None => Vec::new(),
                },
            };
            if elements.is_empty() {
                continue;
            }

            candidate.fill(false);
            queried.fill(false);
            vertex_separation.fill(f64::INFINITY);
            for &e in &elements {
                queried[e] = true;
                for &v in &geometry.tetrahedra[e] {
                    if geometry.topology.is_surface_vertex[v] {
                        candidate[v] = true;
                    }
                }
            }

            for v in (0..geometry.num_vertices).filter(|&v| candidate[v]) {
                let point = position(q, v);
                let (separation, normal) = rigid_geometry.signed_distance(point);
                vertex_separation[v] = separation;
                if separation >= margin {
                    continue;
                }
                let Some(element) = geometry.topology.first_element(v) else {
                    continue;
                };
                let element_vertices = geometry.tetrahedra[element];
                let mut barycentric = [0.0; 4];
                for (slot, &node) in element_vertices.iter().enumerate() {
                    if node == v {
                        barycentric[slot] = 1.0;
                    }
                }
                data.pairs.push(ContactPair {
                    geometry: rigid_geometry.id,
                    body,
                    vertex: v,
                    point,
                    separation,
                    frame: contact_frame(normal),
                    element: ElementId(element as u32),
                    element_vertices,
                    barycentric,
                });
            }

            // A face only adds a pair where it reaches deeper than all of
            // its corners, e.g. a sphere pressing into the face interior.
            let first_face_pair = data.pairs.len();
            let faces = geometry
                .topology
                .boundary_faces
                .iter()
                .zip(&geometry.topology.boundary_face_elements);
            for (face, &owner) in faces {
                if !queried[owner] {
                    continue;
                }
                let triangle = face.map(|v| position(q, v));
                let Some((point, weights)) = rigid_geometry.deepest_point_on_triangle(&triangle)
                else {
                    continue;
                };
                if weights.iter().any(|&w| w >= 1.0 - CORNER_TOLERANCE) {
                    continue;
                }
                let (separation, normal) = rigid_geometry.signed_distance(point);
                let corner_separation = face
                    .iter()
                    .map(|&v| vertex_separation[v])
                    .fold(f64::INFINITY, f64::min);
                if separation >= margin || separation >= corner_separation - DEPTH_TOLERANCE {
                    continue;
                }
                // Faces sharing an edge find the same edge point.
                if data.pairs[first_face_pair..]
                    .iter()
                    .any(|pair| pair.point.distance(point) < DUPLICATE_DISTANCE)
                {
                    continue;
                }

                let element_vertices = geometry.tetrahedra[owner];
                let mut barycentric = [0.0; 4];
                for (&v, &w) in face.iter().zip(&weights) {
                    if let Some(slot) = element_vertices.iter().position(|&node| node == v) {
                        barycentric[slot] += w;
                    }
                }
                let nearest = weights
                    .iter()
                    .enumerate()
                    .fold(0, |best, (k, &w)| if w > weights[best] { k } else { best });
                data.pairs.push(ContactPair {
                    geometry: rigid_geometry.id,
                    body,
                    vertex: face[nearest],
                    point,
                    separation,
                    frame: contact_frame(normal),
                    element: ElementId(owner as u32),
                    element_vertices,
                    barycentric,
                });
            }
        }

        tracing::debug!(
            body = body.0,
            contacts = data.num_contacts(),
            max_penetration = data.max_penetration(),
            "contact detection"
        );
        Ok(data)
    }
}

fn position(q: &[f64], v: usize) -> DVec3 {
    DVec3::new(q[3 * v], q[3 * v + 1], q[3 * v + 2])
}
