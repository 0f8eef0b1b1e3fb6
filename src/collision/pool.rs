//! Free lists of temporary shapes built during a detection pass.

use std::collections::HashMap;

use glam::{DAffine3, DVec3};

use crate::math::Aabb;
use crate::shapes::MeshShape;

/// Bit pattern of a box's half extents.
type BoxSignature = [u64; 3];

fn box_signature(half_extents: DVec3) -> BoxSignature {
    half_extents.to_array().map(f64::to_bits)
}

/// Reusable box meshes, keyed by box size.
///
/// Octree calculators turn every active leaf into a box mesh. A pool lives for one detection
/// pass (one per worker when running in parallel), and meshes released back into it are handed
/// out again instead of being rebuilt.
#[derive(Debug, Default)]
pub struct ShapePool {
    box_meshes: HashMap<BoxSignature, Vec<MeshShape>>,
    created: usize,
    reused: usize,
}

impl ShapePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A box mesh of the given size with its vertices placed by `pose`.
    pub fn acquire_box_mesh(&mut self, half_extents: DVec3, pose: &DAffine3) -> MeshShape {
        let cached = self
            .box_meshes
            .get_mut(&box_signature(half_extents))
            .and_then(Vec::pop);
        let mut mesh = match cached {
            Some(mesh) => {
                self.reused += 1;
                mesh
            }
            None => {
                self.created += 1;
                MeshShape::box_mesh(half_extents)
            }
        };
        let corners = Aabb::from_center_half_extents(DVec3::ZERO, half_extents).corners();
        mesh.set_vertices(corners.into_iter().map(|c| pose.transform_point3(c)));
        mesh
    }

    /// Return a mesh obtained from [`ShapePool::acquire_box_mesh`] with the same half extents.
    pub fn release_box_mesh(&mut self, half_extents: DVec3, mesh: MeshShape) {
        self.box_meshes
            .entry(box_signature(half_extents))
            .or_default()
            .push(mesh);
    }

    /// Number of meshes built from scratch.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of acquisitions served from the free lists.
    pub fn reused(&self) -> usize {
        self.reused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_mesh_reuse() {
        let mut pool = ShapePool::new();
        let half = DVec3::splat(0.5);

        let mesh = pool.acquire_box_mesh(half, &DAffine3::IDENTITY);
        pool.release_box_mesh(half, mesh);
        let moved = pool.acquire_box_mesh(half, &DAffine3::from_translation(DVec3::X * 10.0));

        assert_eq!(pool.created(), 1);
        assert_eq!(pool.reused(), 1);
        let aabb = moved.aabb();
        let eps = 1e-12;
        assert!((aabb.min - DVec3::new(9.5, -0.5, -0.5)).length() < eps);
    }

    #[test]
    fn test_different_sizes_not_shared() {
        let mut pool = ShapePool::new();
        let mesh = pool.acquire_box_mesh(DVec3::ONE, &DAffine3::IDENTITY);
        pool.release_box_mesh(DVec3::ONE, mesh);
        let other = pool.acquire_box_mesh(DVec3::splat(2.0), &DAffine3::IDENTITY);
        assert_eq!(pool.created(), 2);
        assert_eq!(other.aabb().max, DVec3::splat(2.0));
    }
}
