//! Triangle mesh shape.

use glam::{DAffine3, DVec3};

use super::aabb_tree::AabbTree;
use crate::error::{CollisionError, CollisionResult};
use crate::math::{triangle_normal, Aabb};

/// Triangles of a box whose corners are indexed like [`Aabb::corners`], wound outward.
pub const BOX_TRIANGLES: [[usize; 3]; 12] = [
    [0, 2, 3],
    [0, 3, 1],
    [4, 5, 7],
    [4, 7, 6],
    [0, 4, 6],
    [0, 6, 2],
    [1, 3, 7],
    [1, 7, 5],
    [0, 1, 5],
    [0, 5, 4],
    [2, 6, 7],
    [2, 7, 3],
];

/// Indexed triangle mesh with per-triangle unit normals and a bounding volume tree.
///
/// Degenerate triangles are kept in the topology with a zero normal; calculators skip them.
#[derive(Debug, Clone)]
pub struct MeshShape {
    vertices: Vec<DVec3>,
    triangles: Vec<[usize; 3]>,
    normals: Vec<DVec3>,
    tree: AabbTree,
}

impl MeshShape {
    /// Create a mesh, validating that every triangle references existing vertices.
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[usize; 3]>) -> CollisionResult<Self> {
        for (element, triangle) in triangles.iter().enumerate() {
            if let Some(&vertex) = triangle.iter().find(|&&v| v >= vertices.len()) {
                return Err(CollisionError::InvalidIndex {
                    element,
                    vertex,
                    vertex_count: vertices.len(),
                });
            }
        }
        let mut mesh = Self {
            vertices,
            triangles,
            normals: Vec::new(),
            tree: AabbTree::default(),
        };
        mesh.update();
        Ok(mesh)
    }

    /// Closed box mesh centered at the origin.
    pub fn box_mesh(half_extents: DVec3) -> Self {
        let corners = Aabb::from_center_half_extents(DVec3::ZERO, half_extents).corners();
        let mut mesh = Self {
            vertices: corners.to_vec(),
            triangles: BOX_TRIANGLES.to_vec(),
            normals: Vec::new(),
            tree: AabbTree::default(),
        };
        mesh.update();
        mesh
    }

    fn update(&mut self) {
        self.normals = self
            .triangles
            .iter()
            .map(|t| triangle_normal(self.vertices[t[0]], self.vertices[t[1]], self.vertices[t[2]]))
            .collect();
        let boxes = self
            .triangles
            .iter()
            .map(|t| Aabb::from_points(t.iter().map(|&i| self.vertices[i])))
            .collect();
        self.tree = AabbTree::new(boxes);
    }

    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex positions of triangle `index`.
    #[inline]
    pub fn triangle(&self, index: usize) -> [DVec3; 3] {
        self.triangles[index].map(|v| self.vertices[v])
    }

    /// Unit normal of triangle `index`, zero when degenerate.
    #[inline]
    pub fn normal(&self, index: usize) -> DVec3 {
        self.normals[index]
    }

    #[inline]
    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().copied())
    }

    /// Copy of this mesh with every vertex mapped through `pose`.
    pub fn transformed(&self, pose: &DAffine3) -> Self {
        let mut mesh = self.clone();
        mesh.set_vertices(self.vertices.iter().map(|&v| pose.transform_point3(v)));
        mesh
    }

    /// Copy of this mesh with the same topology and new vertex positions.
    pub fn with_vertices(&self, vertices: Vec<DVec3>) -> CollisionResult<Self> {
        if vertices.len() != self.vertices.len() {
            return Err(CollisionError::NodeCountMismatch {
                expected: self.vertices.len(),
                actual: vertices.len(),
            });
        }
        let mut mesh = Self {
            vertices,
            triangles: self.triangles.clone(),
            normals: Vec::new(),
            tree: AabbTree::default(),
        };
        mesh.update();
        Ok(mesh)
    }

    /// Overwrite vertex positions in place, keeping the topology.
    ///
    /// The iterator must yield exactly one position per vertex; extra positions are ignored.
    pub fn set_vertices<I: IntoIterator<Item = DVec3>>(&mut self, positions: I) {
        for (vertex, position) in self.vertices.iter_mut().zip(positions) {
            *vertex = position;
        }
        self.update();
    }
}
