//! Representations: entities carrying a collider and either a rigid pose interval or
//! deformable node state.
//!
//! Every query takes an interval time `t` in [0, 1], with 0 the start of the remaining step
//! and 1 its end.

use std::sync::Arc;

use glam::{DAffine3, DVec3};

use crate::collision::calculator::{PosedInterval, PosedShape};
use crate::collision::location::Location;
use crate::ecs::components::{Collider, DeformableBody, PoseInterval, RigidBody};
use crate::error::{CollisionError, CollisionResult};
use crate::math::{lerp, Aabb};
use crate::shapes::Shape;

fn missing(entity: hecs::Entity, component: &str) -> CollisionError {
    CollisionError::MissingComponent {
        details: format!("{component} on {entity:?}"),
    }
}

fn unresolvable(entity: hecs::Entity, details: &str) -> CollisionError {
    CollisionError::UnresolvableLocation {
        details: format!("{details} on {entity:?}"),
    }
}

/// Shape of a deformable collider re-populated with `positions`.
fn deformed_shape(shape: &Shape, positions: Vec<DVec3>) -> CollisionResult<Shape> {
    match shape {
        Shape::Mesh(mesh) => Ok(Shape::Mesh(mesh.with_vertices(positions)?)),
        Shape::SegmentMesh(mesh) => Ok(Shape::SegmentMesh(mesh.with_vertices(positions)?)),
        other => Err(CollisionError::MissingComponent {
            details: format!(
                "deformable body needs a mesh or segment mesh collider, got {:?}",
                other.kind()
            ),
        }),
    }
}

/// The shape of `entity` placed at interval time `t`.
///
/// Deformable shapes are rebuilt from the interpolated node positions and carry an identity
/// pose; rigid shapes keep their local geometry under the interpolated pose.
pub fn posed_shape(
    world: &hecs::World,
    entity: hecs::Entity,
    t: f64,
) -> CollisionResult<PosedShape> {
    let collider = world
        .get::<&Collider>(entity)
        .map_err(|_| missing(entity, "Collider"))?;

    if let Ok(body) = world.get::<&DeformableBody>(entity) {
        let shape = deformed_shape(&collider.shape, body.positions_at(t))?;
        return Ok(PosedShape::new(Arc::new(shape), DAffine3::IDENTITY));
    }

    let poses = world
        .get::<&PoseInterval>(entity)
        .map_err(|_| missing(entity, "PoseInterval"))?;
    Ok(PosedShape::new(collider.shape.clone(), poses.at(t)))
}

/// The shape of `entity` at the start and end of the remaining interval.
pub fn posed_interval(world: &hecs::World, entity: hecs::Entity) -> CollisionResult<PosedInterval> {
    Ok(PosedInterval::new(
        posed_shape(world, entity, 0.0)?,
        posed_shape(world, entity, 1.0)?,
    ))
}

/// World bounds of `entity` over the whole remaining interval.
pub fn swept_aabb(world: &hecs::World, entity: hecs::Entity) -> CollisionResult<Aabb> {
    let collider = world
        .get::<&Collider>(entity)
        .map_err(|_| missing(entity, "Collider"))?;

    if let Ok(body) = world.get::<&DeformableBody>(entity) {
        let margin = match collider.shape.as_ref() {
            Shape::SegmentMesh(mesh) => mesh.radius(),
            _ => 0.0,
        };
        let bounds = Aabb::from_points(body.previous.iter().chain(&body.current).copied());
        return Ok(bounds.inflate(margin));
    }

    let poses = world
        .get::<&PoseInterval>(entity)
        .map_err(|_| missing(entity, "PoseInterval"))?;
    Ok(collider
        .shape
        .aabb(&poses.previous)
        .merge(&collider.shape.aabb(&poses.current)))
}

/// Whether contact corrections can move `entity`.
pub fn is_movable(world: &hecs::World, entity: hecs::Entity) -> bool {
    if let Ok(body) = world.get::<&DeformableBody>(entity) {
        return body.inverse_masses.iter().any(|&w| w > 0.0);
    }
    world
        .get::<&RigidBody>(entity)
        .is_ok_and(|body| body.is_dynamic())
}

/// Deformable nodes carrying `location`, with their weights.
pub fn node_weights(shape: &Shape, location: &Location) -> Option<Vec<(usize, f64)>> {
    match shape {
        Shape::Mesh(mesh) => {
            if let Some(triangle) = location.triangle {
                debug_assert!(
                    triangle.is_normalized(1e-6),
                    "barycentric weights do not sum to one"
                );
                let nodes = mesh.triangles().get(triangle.index)?;
                let w = triangle.coordinate;
                return Some(vec![(nodes[0], w.x), (nodes[1], w.y), (nodes[2], w.z)]);
            }
        }
        Shape::SegmentMesh(mesh) => {
            if let Some(segment) = location.segment {
                debug_assert!(segment.is_normalized(1e-6), "segment weights do not sum to one");
                let nodes = mesh.segments().get(segment.index)?;
                let w = segment.coordinate;
                return Some(vec![(nodes[0], w.x), (nodes[1], w.y)]);
            }
        }
        _ => {}
    }
    location.node.map(|node| vec![(node, 1.0)])
}

/// World position of `location` on `entity` at interval time `t`.
pub fn localize(
    world: &hecs::World,
    entity: hecs::Entity,
    location: &Location,
    t: f64,
) -> CollisionResult<DVec3> {
    if let Ok(body) = world.get::<&DeformableBody>(entity) {
        let collider = world
            .get::<&Collider>(entity)
            .map_err(|_| missing(entity, "Collider"))?;
        let weights = node_weights(&collider.shape, location)
            .ok_or_else(|| {
                unresolvable(entity, "no element or node coordinate for a deformable body")
            })?;
        let mut position = DVec3::ZERO;
        for (node, weight) in weights {
            if node >= body.node_count() {
                return Err(unresolvable(entity, &format!("node {node} out of range")));
            }
            position += body.position_at(node, t) * weight;
        }
        return Ok(position);
    }

    let local = location
        .rigid_local_position
        .ok_or_else(|| unresolvable(entity, "no rigid local position"))?;
    let poses = world
        .get::<&PoseInterval>(entity)
        .map_err(|_| missing(entity, "PoseInterval"))?;
    Ok(poses.at(t).transform_point3(local))
}

/// Radius added around the centerline of `location` on `entity`, zero unless the point lies on
/// a segment mesh.
pub fn surface_offset(world: &hecs::World, entity: hecs::Entity, location: &Location) -> f64 {
    if location.segment.is_none() {
        return 0.0;
    }
    world
        .get::<&Collider>(entity)
        .ok()
        .and_then(|collider| collider.shape.as_segment_mesh().map(|mesh| mesh.radius()))
        .unwrap_or(0.0)
}

/// Move the start of every representation's interval to time `t`, keeping the end.
pub fn advance(world: &mut hecs::World, t: f64) {
    if t <= 0.0 {
        return;
    }
    for (_, poses) in world.query_mut::<&mut PoseInterval>() {
        poses.previous = poses.at(t);
    }
    for (_, body) in world.query_mut::<&mut DeformableBody>() {
        for (previous, &current) in body.previous.iter_mut().zip(&body.current) {
            *previous = lerp(*previous, current, t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{MeshShape, SegmentMeshShape};

    fn triangle_mesh() -> Shape {
        Shape::Mesh(
            MeshShape::new(
                vec![DVec3::ZERO, DVec3::X, DVec3::Z],
                vec![[0, 1, 2]],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_rigid_posed_shape_and_localize() {
        let mut world = hecs::World::new();
        let entity = world.spawn((
            Collider::new(triangle_mesh()),
            PoseInterval::new(
                DAffine3::from_translation(DVec3::new(0.0, 2.0, 0.0)),
                DAffine3::from_translation(DVec3::ZERO),
            ),
        ));

        let posed = posed_shape(&world, entity, 0.5).unwrap();
        assert!((posed.pose.translation - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-12);

        let location = Location::from_rigid(DVec3::X);
        let start = localize(&world, entity, &location, 0.0).unwrap();
        assert_eq!(start, DVec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_deformable_localize_triangle() {
        let mut world = hecs::World::new();
        let mut body = DeformableBody::with_uniform_mass(
            vec![DVec3::ZERO, DVec3::X, DVec3::Z],
            1.0,
        );
        body.current = vec![DVec3::Y, DVec3::X + DVec3::Y, DVec3::Z + DVec3::Y];
        let entity = world.spawn((Collider::new(triangle_mesh()), body));

        let location = Location::on_triangle(0, DVec3::new(0.5, 0.25, 0.25));
        let eps = 1e-12;
        let p = localize(&world, entity, &location, 0.5).unwrap();
        assert!((p - DVec3::new(0.25, 0.5, 0.25)).length() < eps);

        let posed = posed_shape(&world, entity, 1.0).unwrap();
        assert_eq!(posed.pose, DAffine3::IDENTITY);
        assert_eq!(posed.shape.as_mesh().unwrap().vertices()[0], DVec3::Y);
    }

    #[test]
    fn test_missing_pose_interval() {
        let mut world = hecs::World::new();
        let entity = world.spawn((Collider::new(Shape::Sphere { radius: 1.0 }),));
        assert!(matches!(
            posed_shape(&world, entity, 0.0),
            Err(CollisionError::MissingComponent { .. })
        ));
        assert!(matches!(
            localize(&world, entity, &Location::default(), 0.0),
            Err(CollisionError::UnresolvableLocation { .. })
        ));
    }

    #[test]
    fn test_advance_moves_interval_start() {
        let mut world = hecs::World::new();
        let rigid = world.spawn((
            Collider::new(Shape::Sphere { radius: 1.0 }),
            PoseInterval::new(
                DAffine3::from_translation(DVec3::ZERO),
                DAffine3::from_translation(DVec3::new(4.0, 0.0, 0.0)),
            ),
        ));
        let mut body = DeformableBody::with_uniform_mass(vec![DVec3::ZERO, DVec3::X], 1.0);
        body.current = vec![DVec3::new(0.0, 4.0, 0.0), DVec3::new(1.0, 4.0, 0.0)];
        let deformable = world.spawn((
            Collider::new(Shape::SegmentMesh(SegmentMeshShape::polyline(
                vec![DVec3::ZERO, DVec3::X],
                0.1,
            ))),
            body,
        ));

        advance(&mut world, 0.25);

        let poses = *world.get::<&PoseInterval>(rigid).unwrap();
        assert!((poses.previous.translation - DVec3::X).length() < 1e-12);
        assert_eq!(poses.current.translation, DVec3::new(4.0, 0.0, 0.0));
        let body = world.get::<&DeformableBody>(deformable).unwrap();
        assert_eq!(body.previous[0], DVec3::Y);
    }

    #[test]
    fn test_segment_surface_offset() {
        let mut world = hecs::World::new();
        let entity = world.spawn((
            Collider::new(Shape::SegmentMesh(SegmentMeshShape::polyline(
                vec![DVec3::ZERO, DVec3::X],
                0.3,
            ))),
            PoseInterval::default(),
        ));
        assert_eq!(surface_offset(&world, entity, &Location::on_segment(0, 0.5)), 0.3);
        assert_eq!(surface_offset(&world, entity, &Location::from_rigid(DVec3::ZERO)), 0.0);
    }

    #[test]
    fn test_movable() {
        let mut world = hecs::World::new();
        let dynamic = world.spawn((RigidBody::new_dynamic(1.0),));
        let fixed = world.spawn((RigidBody::new_static(),));
        let pinned = world.spawn((DeformableBody::new(vec![DVec3::ZERO], vec![0.0]).unwrap(),));
        assert!(is_movable(&world, dynamic));
        assert!(!is_movable(&world, fixed));
        assert!(!is_movable(&world, pinned));
    }
}
