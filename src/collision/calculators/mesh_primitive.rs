//! Triangle meshes against spheres and planes.

use glam::DVec3;
use tracing::warn;

use super::{plane_normal, rigid_location, sphere_radius, world_mesh};
use crate::collision::calculator::{ContactCalculator, PosedShape};
use crate::collision::contact::Contact;
use crate::collision::location::Location;
use crate::collision::pool::ShapePool;
use crate::math::geometry::{barycentric_coordinates, closest_point_on_triangle};
use crate::math::Aabb;
use crate::shapes::ShapeKind;

/// Mesh against sphere: one contact per triangle the sphere reaches into.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshSphereContact;

impl ContactCalculator for MeshSphereContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Mesh, ShapeKind::Sphere)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Some(mesh), Some(radius)) = (world_mesh(a), sphere_radius(&b.shape)) else {
            return Vec::new();
        };
        let center = b.pose.translation;
        let to_sphere = b.pose.inverse();
        let query = Aabb::from_center_half_extents(center, DVec3::splat(radius));

        let mut contacts = Vec::new();
        let mut degenerate = 0;
        for index in mesh.tree().intersections(&query) {
            let normal = mesh.normal(index);
            if normal == DVec3::ZERO {
                degenerate += 1;
                continue;
            }
            let [v0, v1, v2] = mesh.triangle(index);
            let closest = closest_point_on_triangle(center, v0, v1, v2);
            if closest.distance(center) >= radius {
                continue;
            }
            let Some(weights) = barycentric_coordinates(closest, v0, v1, v2) else {
                continue;
            };

            let depth = radius - normal.dot(center - closest);
            let sphere_point = center - normal * radius;
            contacts.push(Contact::discrete(
                depth,
                (closest + sphere_point) * 0.5,
                -normal,
                (
                    Location::on_triangle(index, weights)
                        .with_rigid_local_position(a.pose.inverse().transform_point3(closest)),
                    Location::from_rigid(to_sphere.transform_point3(sphere_point)),
                ),
            ));
        }

        if degenerate > 0 {
            warn!(degenerate, "skipped mesh triangles with degenerate normals");
        }
        contacts
    }
}

/// Mesh against plane: one contact per vertex below the plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshPlaneContact;

impl ContactCalculator for MeshPlaneContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Mesh, ShapeKind::Plane)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let Some(mesh) = world_mesh(a) else {
            return Vec::new();
        };
        let normal = plane_normal(&b.pose);
        let origin = b.pose.translation;
        let to_mesh = a.pose.inverse();

        mesh.vertices()
            .iter()
            .enumerate()
            .filter_map(|(index, &vertex)| {
                let distance = (vertex - origin).dot(normal);
                if distance >= 0.0 {
                    return None;
                }
                let on_plane = vertex - normal * distance;
                Some(Contact::discrete(
                    -distance,
                    (vertex + on_plane) * 0.5,
                    normal,
                    (
                        Location::from_rigid(to_mesh.transform_point3(vertex)).with_node(index),
                        rigid_location(&b.pose, on_plane),
                    ),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{MeshShape, Shape};
    use glam::DAffine3;
    use std::sync::Arc;

    fn floor_triangle() -> Shape {
        Shape::Mesh(
            MeshShape::new(
                vec![
                    DVec3::new(-1.0, 0.0, -1.0),
                    DVec3::new(-1.0, 0.0, 3.0),
                    DVec3::new(3.0, 0.0, -1.0),
                ],
                vec![[0, 1, 2]],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_sphere_resting_on_triangle() {
        let mesh = PosedShape::new(Arc::new(floor_triangle()), DAffine3::IDENTITY);
        let sphere = PosedShape::new(
            Arc::new(Shape::Sphere { radius: 0.5 }),
            DAffine3::from_translation(DVec3::new(0.2, 0.4, 0.2)),
        );
        let contacts = MeshSphereContact.dcd_contacts(&mesh, &sphere, &mut ShapePool::new());
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        let eps = 1e-9;
        assert!((contact.depth - 0.1).abs() < eps);
        assert!((contact.normal - DVec3::NEG_Y).length() < eps);
        assert_eq!(contact.penetration_points.0.triangle.map(|t| t.index), Some(0));
        let sphere_local = contact.penetration_points.1.rigid_local_position.unwrap();
        assert!((sphere_local - DVec3::new(0.0, -0.5, 0.0)).length() < eps);
    }

    #[test]
    fn test_sphere_away_from_triangle() {
        let mesh = PosedShape::new(Arc::new(floor_triangle()), DAffine3::IDENTITY);
        let sphere = PosedShape::new(
            Arc::new(Shape::Sphere { radius: 0.5 }),
            DAffine3::from_translation(DVec3::new(0.2, 2.0, 0.2)),
        );
        assert!(MeshSphereContact
            .dcd_contacts(&mesh, &sphere, &mut ShapePool::new())
            .is_empty());
    }

    #[test]
    fn test_mesh_vertices_below_plane() {
        let mesh = PosedShape::new(
            Arc::new(floor_triangle()),
            DAffine3::from_translation(DVec3::new(0.0, -0.25, 0.0)),
        );
        let plane = PosedShape::new(Arc::new(Shape::Plane), DAffine3::IDENTITY);
        let contacts = MeshPlaneContact.dcd_contacts(&mesh, &plane, &mut ShapePool::new());
        assert_eq!(contacts.len(), 3);
        for (i, contact) in contacts.iter().enumerate() {
            assert!((contact.depth - 0.25).abs() < 1e-12);
            assert_eq!(contact.normal, DVec3::Y);
            assert_eq!(contact.penetration_points.0.node, Some(i));
        }
    }
}
