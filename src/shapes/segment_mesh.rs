//! Segment mesh shape: a set of segments swept by a sphere (a chain of capsules).

use glam::{DAffine3, DVec3};

use super::aabb_tree::AabbTree;
use crate::error::{CollisionError, CollisionResult};
use crate::math::Aabb;

/// Indexed segments sharing one radius, with a bounding volume tree over the inflated segments.
#[derive(Debug, Clone)]
pub struct SegmentMeshShape {
    vertices: Vec<DVec3>,
    segments: Vec<[usize; 2]>,
    radius: f64,
    tree: AabbTree,
}

impl SegmentMeshShape {
    pub fn new(
        vertices: Vec<DVec3>,
        segments: Vec<[usize; 2]>,
        radius: f64,
    ) -> CollisionResult<Self> {
        for (element, segment) in segments.iter().enumerate() {
            if let Some(&vertex) = segment.iter().find(|&&v| v >= vertices.len()) {
                return Err(CollisionError::InvalidIndex {
                    element,
                    vertex,
                    vertex_count: vertices.len(),
                });
            }
        }
        let mut mesh = Self {
            vertices,
            segments,
            radius: radius.max(0.0),
            tree: AabbTree::default(),
        };
        mesh.update();
        Ok(mesh)
    }

    /// Open polyline through `vertices` in order.
    pub fn polyline(vertices: Vec<DVec3>, radius: f64) -> Self {
        let segments = (1..vertices.len()).map(|i| [i - 1, i]).collect();
        let mut mesh = Self {
            vertices,
            segments,
            radius: radius.max(0.0),
            tree: AabbTree::default(),
        };
        mesh.update();
        mesh
    }

    fn update(&mut self) {
        let boxes = self
            .segments
            .iter()
            .map(|s| Aabb::from_points(s.iter().map(|&i| self.vertices[i])).inflate(self.radius))
            .collect();
        self.tree = AabbTree::new(boxes);
    }

    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    #[inline]
    pub fn segments(&self) -> &[[usize; 2]] {
        &self.segments
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn segment(&self, index: usize) -> [DVec3; 2] {
        self.segments[index].map(|v| self.vertices[v])
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().copied()).inflate(self.radius)
    }

    pub fn transformed(&self, pose: &DAffine3) -> Self {
        let mut mesh = self.clone();
        for v in &mut mesh.vertices {
            *v = pose.transform_point3(*v);
        }
        mesh.update();
        mesh
    }

    /// Copy with the same topology and radius and new vertex positions.
    pub fn with_vertices(&self, vertices: Vec<DVec3>) -> CollisionResult<Self> {
        if vertices.len() != self.vertices.len() {
            return Err(CollisionError::NodeCountMismatch {
                expected: self.vertices.len(),
                actual: vertices.len(),
            });
        }
        let mut mesh = Self {
            vertices,
            segments: self.segments.clone(),
            radius: self.radius,
            tree: AabbTree::default(),
        };
        mesh.update();
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_topology() {
        let mesh = SegmentMeshShape::polyline(vec![DVec3::ZERO, DVec3::X, DVec3::X * 2.0], 0.1);
        assert_eq!(mesh.segments(), &[[0, 1], [1, 2]]);
        assert_eq!(mesh.segment(1), [DVec3::X, DVec3::X * 2.0]);
    }

    #[test]
    fn test_tree_inflated_by_radius() {
        let mesh = SegmentMeshShape::polyline(vec![DVec3::ZERO, DVec3::X], 0.25);
        let bounds = mesh.tree().bounds();
        let eps = 1e-12;
        assert!((bounds.min - DVec3::splat(-0.25)).length() < eps);
        assert!((bounds.max - DVec3::new(1.25, 0.25, 0.25)).length() < eps);
    }

    #[test]
    fn test_invalid_segment_rejected() {
        let result = SegmentMeshShape::new(vec![DVec3::ZERO], vec![[0, 1]], 0.1);
        assert!(matches!(result, Err(CollisionError::InvalidIndex { element: 0, vertex: 1, .. })));
    }
}
