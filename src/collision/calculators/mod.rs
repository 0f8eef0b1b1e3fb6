//! Built-in contact calculators.

mod mesh_mesh;
mod mesh_primitive;
mod octree;
mod primitives;
mod segment_mesh;

use std::borrow::Cow;

use glam::{DAffine3, DVec3};

pub use mesh_mesh::{mesh_mesh_ccd, mesh_mesh_dcd, MeshMeshContact, MeshSweep};
pub use mesh_primitive::{MeshPlaneContact, MeshSphereContact};
pub use octree::{OctreeCapsuleContact, OctreeMeshContact, OctreeSphereContact};
pub use primitives::{
    box_capsule, box_sphere, capsule_capsule, sphere_plane, sphere_sphere, BoxCapsuleContact,
    BoxSphereContact, CapsuleCapsuleContact, SpherePlaneContact, SphereSphereContact,
};
pub use segment_mesh::SegmentMeshContact;

use super::calculator::PosedShape;
use super::contact::Contact;
use super::location::Location;
use crate::shapes::{MeshShape, SegmentMeshShape, Shape};

/// Penetration between two convex primitives, in world space.
///
/// Moving A by `normal * depth` brings `point_a` onto `point_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    pub depth: f64,
    pub normal: DVec3,
    pub point_a: DVec3,
    pub point_b: DVec3,
}

impl Penetration {
    /// Discrete contact with rigid-local penetration points.
    pub fn into_contact(self, pose_a: &DAffine3, pose_b: &DAffine3) -> Contact {
        Contact::discrete(
            self.depth,
            (self.point_a + self.point_b) * 0.5,
            self.normal,
            (
                rigid_location(pose_a, self.point_a),
                rigid_location(pose_b, self.point_b),
            ),
        )
    }
}

/// Location holding `world_point` expressed in the frame of `pose`.
pub(crate) fn rigid_location(pose: &DAffine3, world_point: DVec3) -> Location {
    Location::from_rigid(pose.inverse().transform_point3(world_point))
}

/// The mesh of `posed` with its vertices in world space.
pub(crate) fn world_mesh(posed: &PosedShape) -> Option<Cow<'_, MeshShape>> {
    let mesh = posed.shape.as_mesh()?;
    if posed.pose == DAffine3::IDENTITY {
        Some(Cow::Borrowed(mesh))
    } else {
        Some(Cow::Owned(mesh.transformed(&posed.pose)))
    }
}

pub(crate) fn world_segment_mesh(posed: &PosedShape) -> Option<Cow<'_, SegmentMeshShape>> {
    let mesh = posed.shape.as_segment_mesh()?;
    if posed.pose == DAffine3::IDENTITY {
        Some(Cow::Borrowed(mesh))
    } else {
        Some(Cow::Owned(mesh.transformed(&posed.pose)))
    }
}

/// World endpoints of a capsule's core segment.
pub(crate) fn capsule_segment(pose: &DAffine3, half_height: f64) -> (DVec3, DVec3) {
    (
        pose.transform_point3(DVec3::new(0.0, -half_height, 0.0)),
        pose.transform_point3(DVec3::new(0.0, half_height, 0.0)),
    )
}

pub(crate) fn sphere_radius(shape: &Shape) -> Option<f64> {
    match shape {
        Shape::Sphere { radius } => Some(*radius),
        _ => None,
    }
}

pub(crate) fn capsule_dimensions(shape: &Shape) -> Option<(f64, f64)> {
    match shape {
        Shape::Capsule {
            radius,
            half_height,
        } => Some((*radius, *half_height)),
        _ => None,
    }
}

/// World +Y axis of a plane pose, i.e. the plane normal.
pub(crate) fn plane_normal(pose: &DAffine3) -> DVec3 {
    pose.transform_vector3(DVec3::Y).normalize_or_zero()
}
