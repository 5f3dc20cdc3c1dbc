//! Bounding-volume hierarchy over tetrahedra.
//!
//! Binary tree with one element per leaf, split at the median centroid
//! along the longest axis of the centroid bounds. The topology is built
//! once from the reference configuration; each step only the boxes are
//! refit to the current positions.

use pliant_math::DVec3;
use pliant_mesh::VolumeMesh;

use crate::geometry::Aabb;

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf { element: usize },
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct BvhNode {
    aabb: Aabb,
    kind: NodeKind,
}

/// AABB tree over the elements of one volume mesh.
#[derive(Debug, Clone)]
pub struct Bvh {
    /// Pre-order: every child index is greater than its parent's.
    nodes: Vec<BvhNode>,
    num_elements: usize,
}

impl Bvh {
    /// Builds the hierarchy from per-element boxes.
    pub fn build(element_boxes: &[Aabb]) -> Self {
        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * element_boxes.len()),
            num_elements: element_boxes.len(),
        };
        if !element_boxes.is_empty() {
            let mut indices: Vec<usize> = (0..element_boxes.len()).collect();
            bvh.build_node(element_boxes, &mut indices);
        }
        bvh
    }

    /// Builds the hierarchy for a mesh at flattened positions `q`.
    pub fn from_positions(mesh: &VolumeMesh, q: &[f64]) -> Self {
        Self::build(&element_boxes(&mesh.tetrahedra, q))
    }

    fn build_node(&mut self, boxes: &[Aabb], indices: &mut [usize]) -> usize {
        let slot = self.nodes.len();
        let aabb = indices
            .iter()
            .fold(Aabb::empty(), |acc, &e| acc.union(&boxes[e]));

        if indices.len() == 1 {
            let element = indices[0];
            self.nodes.push(BvhNode {
                aabb,
                kind: NodeKind::Leaf { element },
            });
            return slot;
        }

        let centroids = Aabb::from_points(
            &indices.iter().map(|&e| boxes[e].center()).collect::<Vec<_>>(),
        );
        let extent = centroids.max - centroids.min;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            boxes[a].center()[axis].total_cmp(&boxes[b].center()[axis])
        });

        // Reserve the slot, fill in the children once their indices exist.
        self.nodes.push(BvhNode {
            aabb,
            kind: NodeKind::Internal { left: 0, right: 0 },
        });
        let (lo, hi) = indices.split_at_mut(mid);
        let left = self.build_node(boxes, lo);
        let right = self.build_node(boxes, hi);
        self.nodes[slot].kind = NodeKind::Internal { left, right };
        slot
    }

    /// Recomputes every box from new per-element boxes, keeping the tree shape.
    pub fn refit(&mut self, element_boxes: &[Aabb]) {
        debug_assert_eq!(element_boxes.len(), self.num_elements);
        for i in (0..self.nodes.len()).rev() {
            let aabb = match self.nodes[i].kind {
                NodeKind::Leaf { element } => element_boxes[element],
                NodeKind::Internal { left, right } => {
                    self.nodes[left].aabb.union(&self.nodes[right].aabb)
                }
            };
            self.nodes[i].aabb = aabb;
        }
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Box enclosing the whole body, if it has any elements.
    pub fn root_aabb(&self) -> Option<Aabb> {
        self.nodes.first().map(|node| node.aabb)
    }

    /// Elements whose box passes `test`, in ascending order. Subtrees whose
    /// box fails the test are skipped entirely.
    pub fn query<F>(&self, test: F) -> Vec<usize>
    where
        F: Fn(&Aabb) -> bool,
    {
        let mut hits = Vec::new();
        if self.nodes.is_empty() {
            return hits;
        }
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !test(&node.aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { element } => hits.push(element),
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        hits.sort_unstable();
        hits
    }

    /// Elements whose box overlaps `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<usize> {
        self.query(|node| node.intersects(aabb))
    }
}

/// Per-element boxes at flattened positions `q`.
pub fn element_boxes(tetrahedra: &[[usize; 4]], q: &[f64]) -> Vec<Aabb> {
    tetrahedra
        .iter()
        .map(|tet| {
            let corners = tet.map(|v| DVec3::new(q[3 * v], q[3 * v + 1], q[3 * v + 2]));
            Aabb::from_points(&corners)
        })
        .collect()
}
