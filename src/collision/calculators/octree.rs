//! Octrees against spheres, capsules and meshes.
//!
//! Every active leaf overlapping the other shape is treated as a box and handed to the box
//! calculators. Penetration points on the octree carry the leaf index as their node.

use glam::{DAffine3, DVec3};

use super::{
    box_capsule, box_sphere, capsule_dimensions, mesh_mesh_dcd, sphere_radius, world_mesh,
    Penetration,
};
use crate::collision::calculator::{ContactCalculator, PosedShape};
use crate::collision::contact::Contact;
use crate::collision::location::Location;
use crate::collision::pool::ShapePool;
use crate::shapes::{OctreeShape, Shape, ShapeKind};

/// An active leaf placed in the world.
struct PosedLeaf {
    index: usize,
    half_extents: DVec3,
    pose: DAffine3,
}

fn overlapping_leaves(
    octree: &OctreeShape,
    octree_pose: &DAffine3,
    other: &PosedShape,
) -> Vec<PosedLeaf> {
    let query = other
        .shape
        .aabb(&other.pose)
        .transformed(&octree_pose.inverse());
    octree
        .leaves_overlapping(&query)
        .into_iter()
        .map(|index| {
            let leaf = octree.leaves()[index];
            PosedLeaf {
                index,
                half_extents: leaf.extents() * 0.5,
                pose: *octree_pose * DAffine3::from_translation(leaf.center()),
            }
        })
        .collect()
}

fn as_octree(shape: &Shape) -> Option<&OctreeShape> {
    match shape {
        Shape::Octree(octree) => Some(octree),
        _ => None,
    }
}

/// Rewrite the octree side of a leaf contact to point at the leaf.
fn on_leaf(mut contact: Contact, leaf: usize, to_octree: &DAffine3, world_point: DVec3) -> Contact {
    contact.penetration_points.0 =
        Location::from_rigid(to_octree.transform_point3(world_point)).with_node(leaf);
    contact
}

fn leaf_penetrations<F>(a: &PosedShape, b: &PosedShape, mut penetration: F) -> Vec<Contact>
where
    F: FnMut(&PosedLeaf) -> Option<Penetration>,
{
    let Some(octree) = as_octree(&a.shape) else {
        return Vec::new();
    };
    let to_octree = a.pose.inverse();
    overlapping_leaves(octree, &a.pose, b)
        .iter()
        .filter_map(|leaf| {
            let p = penetration(leaf)?;
            Some(on_leaf(p.into_contact(&a.pose, &b.pose), leaf.index, &to_octree, p.point_a))
        })
        .collect()
}

/// Octree against sphere.
#[derive(Debug, Clone, Copy, Default)]
pub struct OctreeSphereContact;

impl ContactCalculator for OctreeSphereContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Octree, ShapeKind::Sphere)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let Some(radius) = sphere_radius(&b.shape) else {
            return Vec::new();
        };
        leaf_penetrations(a, b, |leaf| {
            box_sphere(leaf.half_extents, &leaf.pose, b.pose.translation, radius)
        })
    }
}

/// Octree against capsule.
#[derive(Debug, Clone, Copy, Default)]
pub struct OctreeCapsuleContact;

impl ContactCalculator for OctreeCapsuleContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Octree, ShapeKind::Capsule)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let Some((radius, half_height)) = capsule_dimensions(&b.shape) else {
            return Vec::new();
        };
        leaf_penetrations(a, b, |leaf| {
            box_capsule(leaf.half_extents, &leaf.pose, &b.pose, radius, half_height)
        })
    }
}

/// Octree against mesh, through pooled box meshes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OctreeMeshContact;

impl ContactCalculator for OctreeMeshContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Octree, ShapeKind::Mesh)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, pool: &mut ShapePool) -> Vec<Contact> {
        let (Some(octree), Some(mesh)) = (as_octree(&a.shape), world_mesh(b)) else {
            return Vec::new();
        };
        let to_octree = a.pose.inverse();

        let mut contacts = Vec::new();
        for leaf in overlapping_leaves(octree, &a.pose, b) {
            let box_mesh = pool.acquire_box_mesh(leaf.half_extents, &leaf.pose);
            for contact in mesh_mesh_dcd(&box_mesh, &DAffine3::IDENTITY, &mesh, &b.pose) {
                let world_point = contact
                    .penetration_points
                    .0
                    .rigid_local_position
                    .unwrap_or(contact.point);
                contacts.push(on_leaf(contact, leaf.index, &to_octree, world_point));
            }
            pool.release_box_mesh(leaf.half_extents, box_mesh);
        }
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;
    use crate::shapes::MeshShape;
    use std::sync::Arc;

    /// Two levels over [0, 2]^3 with the single leaf [0, 1]^3 active.
    fn corner_octree() -> Arc<Shape> {
        Arc::new(Shape::Octree(OctreeShape::from_points(
            Aabb::new(DVec3::ZERO, DVec3::splat(2.0)),
            2,
            [DVec3::splat(0.5)],
        )))
    }

    #[test]
    fn test_octree_sphere_hits_active_leaf() {
        let octree = PosedShape::new(corner_octree(), DAffine3::IDENTITY);
        let sphere = PosedShape::new(
            Arc::new(Shape::Sphere { radius: 0.25 }),
            DAffine3::from_translation(DVec3::new(0.5, 1.1, 0.5)),
        );
        let contacts = OctreeSphereContact.dcd_contacts(&octree, &sphere, &mut ShapePool::new());
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        let eps = 1e-9;
        assert!((contact.depth - 0.15).abs() < eps);
        assert!((contact.normal - DVec3::NEG_Y).length() < eps);
        let on_octree = contact.penetration_points.0;
        assert_eq!(on_octree.node, Some(0));
        assert!(on_octree.triangle.is_none());
        assert!(
            (on_octree.rigid_local_position.unwrap() - DVec3::new(0.5, 1.0, 0.5)).length() < eps
        );
    }

    #[test]
    fn test_octree_sphere_over_inactive_leaf() {
        let octree = PosedShape::new(corner_octree(), DAffine3::IDENTITY);
        let sphere = PosedShape::new(
            Arc::new(Shape::Sphere { radius: 0.25 }),
            DAffine3::from_translation(DVec3::new(1.5, 2.1, 1.5)),
        );
        assert!(OctreeSphereContact
            .dcd_contacts(&octree, &sphere, &mut ShapePool::new())
            .is_empty());
    }

    #[test]
    fn test_octree_capsule() {
        let octree = PosedShape::new(
            corner_octree(),
            DAffine3::from_translation(DVec3::new(5.0, 0.0, 0.0)),
        );
        let capsule = PosedShape::new(
            Arc::new(Shape::Capsule {
                radius: 0.2,
                half_height: 0.3,
            }),
            DAffine3::from_translation(DVec3::new(5.5, 1.4, 0.5)),
        );
        let contacts = OctreeCapsuleContact.dcd_contacts(&octree, &capsule, &mut ShapePool::new());
        assert_eq!(contacts.len(), 1);
        assert!((contacts[0].depth - 0.1).abs() < 1e-6);
        assert_eq!(contacts[0].penetration_points.0.node, Some(0));
    }

    #[test]
    fn test_octree_mesh_reuses_box_meshes() {
        let octree = PosedShape::new(corner_octree(), DAffine3::IDENTITY);
        let mesh = PosedShape::new(
            Arc::new(Shape::Mesh(
                MeshShape::new(
                    vec![
                        DVec3::new(0.5, 0.9, 0.5),
                        DVec3::new(3.0, 1.5, 0.5),
                        DVec3::new(0.5, 1.5, 3.0),
                    ],
                    vec![[0, 1, 2]],
                )
                .unwrap(),
            )),
            DAffine3::IDENTITY,
        );
        let mut pool = ShapePool::new();
        let first = OctreeMeshContact.dcd_contacts(&octree, &mesh, &mut pool);
        let second = OctreeMeshContact.dcd_contacts(&octree, &mesh, &mut pool);

        assert!(!first.is_empty());
        assert_eq!(first.len(), second.len());
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.reused(), 1);
        for contact in &first {
            assert_eq!(contact.penetration_points.0.node, Some(0));
            assert!(contact.penetration_points.0.triangle.is_none());
            assert!(contact.penetration_points.1.triangle.is_some());
        }
    }
}
