//! Mesh topology queries.
//!
//! Builds adjacency data from the tetrahedron index buffer: which
//! elements touch each vertex, and which faces lie on the boundary.
//! Contact detection samples boundary vertices and boundary faces; the
//! enclosing element of a contact vertex is taken from the incidence
//! lists, that of a face from its owning tetrahedron.

use std::collections::HashMap;

use crate::mesh::VolumeMesh;

/// Precomputed topology information for a tetrahedral mesh.
#[derive(Debug, Clone)]
pub struct VolumeTopology {
    /// For each vertex, the tetrahedra that contain it (ascending).
    pub vertex_elements: Vec<Vec<usize>>,

    /// Boundary triangles, wound so that `(b−a)×(c−a)` points outward.
    pub boundary_faces: Vec<[usize; 3]>,

    /// Tetrahedron owning each boundary face.
    pub boundary_face_elements: Vec<usize>,

    /// Vertices on the boundary surface (ascending, unique).
    pub surface_vertices: Vec<usize>,

    /// Per-vertex boundary flag.
    pub is_surface_vertex: Vec<bool>,
}

/// Faces of a positively oriented tetrahedron, outward wound.
const TET_FACES: [[usize; 3]; 4] = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];

impl VolumeTopology {
    /// Builds topology from a tetrahedral mesh.
    pub fn build(mesh: &VolumeMesh) -> Self {
        let n = mesh.vertex_count();

        let mut vertex_elements = vec![Vec::new(); n];
        for (e, tet) in mesh.tetrahedra.iter().enumerate() {
            for &v in tet {
                vertex_elements[v].push(e);
            }
        }

        // A face is on the boundary iff exactly one tetrahedron owns it.
        let mut face_count: HashMap<[usize; 3], (usize, [usize; 3], usize)> = HashMap::new();
        for (e, tet) in mesh.tetrahedra.iter().enumerate() {
            for local in &TET_FACES {
                let face = local.map(|i| tet[i]);
                let mut key = face;
                key.sort_unstable();
                face_count
                    .entry(key)
                    .and_modify(|(count, _, _)| *count += 1)
                    .or_insert((1, face, e));
            }
        }

        let mut boundary: Vec<([usize; 3], [usize; 3], usize)> = face_count
            .into_iter()
            .filter(|(_, (count, _, _))| *count == 1)
            .map(|(key, (_, face, e))| (key, face, e))
            .collect();
        boundary.sort_unstable_by_key(|(key, _, _)| *key);
        let boundary_faces: Vec<[usize; 3]> = boundary.iter().map(|(_, f, _)| *f).collect();
        let boundary_face_elements: Vec<usize> = boundary.iter().map(|(_, _, e)| *e).collect();

        let mut is_surface_vertex = vec![false; n];
        for face in &boundary_faces {
            for &v in face {
                is_surface_vertex[v] = true;
            }
        }
        let surface_vertices = (0..n).filter(|&v| is_surface_vertex[v]).collect();

        Self {
            vertex_elements,
            boundary_faces,
            boundary_face_elements,
            surface_vertices,
            is_surface_vertex,
        }
    }

    /// Lowest-index tetrahedron incident to `vertex`, if any.
    pub fn first_element(&self, vertex: usize) -> Option<usize> {
        self.vertex_elements
            .get(vertex)
            .and_then(|elements| elements.first().copied())
    }

    /// Returns the number of boundary triangles.
    pub fn boundary_face_count(&self) -> usize {
        self.boundary_faces.len()
    }
}
