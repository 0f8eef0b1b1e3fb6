//! Collision shapes.
//!
//! Shapes are expressed in their local frame and posed by a [`glam::DAffine3`]. Each variant
//! has a [`ShapeKind`] tag used to dispatch shape pairs to contact calculators.

pub mod aabb_tree;
pub mod mesh;
pub mod octree;
pub mod segment_mesh;

use glam::{DAffine3, DVec3};

use crate::math::Aabb;

pub use aabb_tree::AabbTree;
pub use mesh::MeshShape;
pub use octree::{OctreeNode, OctreeShape};
pub use segment_mesh::SegmentMeshShape;

/// Type tag of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    Sphere,
    Box,
    Capsule,
    Plane,
    Mesh,
    SegmentMesh,
    Octree,
}

/// A collision shape in its local frame.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere { radius: f64 },
    Box { half_extents: DVec3 },
    /// Capsule along the local Y axis.
    Capsule { radius: f64, half_height: f64 },
    /// Infinite plane through the origin with normal +Y.
    Plane,
    Mesh(MeshShape),
    SegmentMesh(SegmentMeshShape),
    Octree(OctreeShape),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere { .. } => ShapeKind::Sphere,
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Capsule { .. } => ShapeKind::Capsule,
            Shape::Plane => ShapeKind::Plane,
            Shape::Mesh(_) => ShapeKind::Mesh,
            Shape::SegmentMesh(_) => ShapeKind::SegmentMesh,
            Shape::Octree(_) => ShapeKind::Octree,
        }
    }

    /// Bounds in the local frame. Planes are unbounded.
    pub fn local_aabb(&self) -> Aabb {
        match self {
            Shape::Sphere { radius } => {
                Aabb::from_center_half_extents(DVec3::ZERO, DVec3::splat(*radius))
            }
            Shape::Box { half_extents } => {
                Aabb::from_center_half_extents(DVec3::ZERO, *half_extents)
            }
            Shape::Capsule {
                radius,
                half_height,
            } => Aabb::from_center_half_extents(
                DVec3::ZERO,
                DVec3::new(*radius, half_height + radius, *radius),
            ),
            Shape::Plane => unbounded(),
            Shape::Mesh(mesh) => mesh.aabb(),
            Shape::SegmentMesh(mesh) => mesh.aabb(),
            Shape::Octree(octree) => octree.aabb(),
        }
    }

    /// World bounds under `pose`.
    pub fn aabb(&self, pose: &DAffine3) -> Aabb {
        match self {
            Shape::Plane => unbounded(),
            Shape::Sphere { radius } => {
                Aabb::from_center_half_extents(pose.translation, DVec3::splat(*radius))
            }
            Shape::Mesh(mesh) if *pose == DAffine3::IDENTITY => mesh.aabb(),
            Shape::Mesh(mesh) => {
                Aabb::from_points(mesh.vertices().iter().map(|&v| pose.transform_point3(v)))
            }
            _ => self.local_aabb().transformed(pose),
        }
    }

    /// The mesh, when this shape is one.
    pub fn as_mesh(&self) -> Option<&MeshShape> {
        match self {
            Shape::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_segment_mesh(&self) -> Option<&SegmentMeshShape> {
        match self {
            Shape::SegmentMesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Number of vertices driven by node state, zero for analytic shapes.
    pub fn vertex_count(&self) -> usize {
        match self {
            Shape::Mesh(mesh) => mesh.vertices().len(),
            Shape::SegmentMesh(mesh) => mesh.vertices().len(),
            _ => 0,
        }
    }
}

fn unbounded() -> Aabb {
    Aabb::new(DVec3::splat(f64::NEG_INFINITY), DVec3::splat(f64::INFINITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Shape::Plane.kind(), ShapeKind::Plane);
        assert_eq!(Shape::Sphere { radius: 1.0 }.kind(), ShapeKind::Sphere);
        assert_eq!(Shape::Mesh(MeshShape::box_mesh(DVec3::ONE)).kind(), ShapeKind::Mesh);
    }

    #[test]
    fn test_capsule_aabb() {
        let capsule = Shape::Capsule {
            radius: 0.5,
            half_height: 1.0,
        };
        let aabb = capsule.aabb(&DAffine3::from_translation(DVec3::new(1.0, 0.0, 0.0)));
        let eps = 1e-12;
        assert!((aabb.min - DVec3::new(0.5, -1.5, -0.5)).length() < eps);
        assert!((aabb.max - DVec3::new(1.5, 1.5, 0.5)).length() < eps);
    }

    #[test]
    fn test_plane_overlaps_everything() {
        let plane = Shape::Plane.aabb(&DAffine3::from_rotation_x(0.3));
        let far = Aabb::new(DVec3::splat(1e6), DVec3::splat(1e6 + 1.0));
        assert!(plane.overlaps(&far));
    }

    #[test]
    fn test_posed_mesh_aabb() {
        let mesh = Shape::Mesh(MeshShape::box_mesh(DVec3::ONE));
        let aabb = mesh.aabb(&DAffine3::from_translation(DVec3::Z * 3.0));
        assert_eq!(aabb.min, DVec3::new(-1.0, -1.0, 2.0));
        assert_eq!(aabb.max, DVec3::new(1.0, 1.0, 4.0));
    }
}
