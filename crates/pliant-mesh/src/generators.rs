//! Procedural mesh generators for tests and demos.
//!
//! These generators produce deterministic, resolution-configurable
//! tetrahedral meshes with positive element orientation.

use pliant_math::DVec3;

use crate::mesh::VolumeMesh;

/// Generates a structured box of tetrahedra.
///
/// The box spans `[-size/2, size/2]` on every axis, centered at the
/// origin. Each of the `nx × ny × nz` hexahedral cells is split into six
/// tetrahedra along its main diagonal (Kuhn subdivision), which keeps
/// neighboring cells conforming.
///
/// # Example
/// ```
/// use pliant_math::DVec3;
/// use pliant_mesh::generators::box_mesh;
/// let mesh = box_mesh(2, 1, 1, DVec3::new(2.0, 1.0, 1.0));
/// assert_eq!(mesh.vertex_count(), 12); // 3×2×2 vertices
/// assert_eq!(mesh.element_count(), 12); // 2 cells × 6 tets
/// ```
pub fn box_mesh(nx: usize, ny: usize, nz: usize, size: DVec3) -> VolumeMesh {
    let (nx, ny, nz) = (nx.max(1), ny.max(1), nz.max(1));
    let verts = [nx + 1, ny + 1, nz + 1];
    let half = size * 0.5;
    let step = DVec3::new(size.x / nx as f64, size.y / ny as f64, size.z / nz as f64);

    let index = |i: usize, j: usize, k: usize| (k * verts[1] + j) * verts[0] + i;

    let mut vertices = Vec::with_capacity(verts[0] * verts[1] * verts[2]);
    for k in 0..verts[2] {
        for j in 0..verts[1] {
            for i in 0..verts[0] {
                vertices.push(DVec3::new(
                    -half.x + i as f64 * step.x,
                    -half.y + j as f64 * step.y,
                    -half.z + k as f64 * step.z,
                ));
            }
        }
    }

    // Monotone paths from corner 000 to corner 111, one per axis permutation.
    const AXIS_ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut tetrahedra = Vec::with_capacity(nx * ny * nz * 6);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for order in &AXIS_ORDERS {
                    let mut corner = [i, j, k];
                    let mut tet = [index(i, j, k); 4];
                    for (slot, &axis) in order.iter().enumerate() {
                        corner[axis] += 1;
                        tet[slot + 1] = index(corner[0], corner[1], corner[2]);
                    }
                    let [x0, x1, x2, x3] = tet.map(|v| vertices[v]);
                    if (x1 - x0).cross(x2 - x0).dot(x3 - x0) < 0.0 {
                        tet.swap(2, 3);
                    }
                    tetrahedra.push(tet);
                }
            }
        }
    }

    VolumeMesh {
        vertices,
        tetrahedra,
    }
}

/// Generates a single tetrahedron at the unit corner:
/// (0,0,0), (1,0,0), (0,1,0), (0,0,1) scaled by `size`.
pub fn unit_tetrahedron(size: f64) -> VolumeMesh {
    VolumeMesh {
        vertices: vec![
            DVec3::ZERO,
            DVec3::X * size,
            DVec3::Y * size,
            DVec3::Z * size,
        ],
        tetrahedra: vec![[0, 1, 2, 3]],
    }
}
