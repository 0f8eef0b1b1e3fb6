//! Scene builders shared by the collision benchmarks.

use anyhow::Result;
use glam::{DAffine3, DVec3};
use rein_collide::ecs::components::{Collider, PoseInterval, RigidBody};
use rein_collide::physics::{PhysicsConfig, PhysicsWorld};
use rein_collide::shapes::{MeshShape, Shape};

/// Square grid of `n * n` quads in the XZ plane, centered at the origin, two triangles per
/// quad with normals along +Y.
pub fn grid_mesh(n: usize, size: f64) -> Result<MeshShape> {
    let step = size / n as f64;
    let half = size * 0.5;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for i in 0..=n {
        for j in 0..=n {
            vertices.push(DVec3::new(i as f64 * step - half, 0.0, j as f64 * step - half));
        }
    }
    let index = |i: usize, j: usize| i * (n + 1) + j;
    let mut triangles = Vec::with_capacity(2 * n * n);
    for i in 0..n {
        for j in 0..n {
            triangles.push([index(i, j), index(i, j + 1), index(i + 1, j)]);
            triangles.push([index(i + 1, j), index(i, j + 1), index(i + 1, j + 1)]);
        }
    }
    Ok(MeshShape::new(vertices, triangles)?)
}

/// `count` spheres of radius 0.5 in a row along X, spaced `spacing` apart.
pub fn setup_sphere_world(count: usize, spacing: f64) -> hecs::World {
    let mut world = hecs::World::new();
    for i in 0..count {
        world.spawn((
            Collider::new(Shape::Sphere { radius: 0.5 }),
            PoseInterval::fixed(
                DAffine3::from_translation(DVec3::new(i as f64 * spacing, 0.0, 0.0)),
            ),
            RigidBody::new_dynamic(1.0),
        ));
    }
    world
}

/// A static floor grid and `count` continuous grid tiles falling through it within one step.
pub fn setup_ccd_scene(count: usize, resolution: usize) -> Result<(hecs::World, PhysicsWorld)> {
    let mut world = hecs::World::new();
    let floor = grid_mesh(resolution, count as f64 * 2.0 + 2.0)?;
    world.spawn((
        Collider::new(Shape::Mesh(floor)),
        PoseInterval::default(),
        RigidBody::new_static(),
    ));

    for i in 0..count {
        let tile = grid_mesh(resolution.max(1) / 2 + 1, 1.0)?;
        let x = i as f64 * 2.0 - count as f64;
        world.spawn((
            Collider::continuous(Shape::Mesh(tile)),
            PoseInterval::fixed(DAffine3::from_translation(DVec3::new(x, 1.0, 0.0))),
            RigidBody::new_dynamic(1.0)
                .with_inertia(DVec3::ZERO)
                .with_linear_velocity(DVec3::new(0.0, -120.0, 0.0)),
        ));
    }

    let physics = PhysicsWorld::new(PhysicsConfig {
        gravity: DVec3::ZERO,
        ..Default::default()
    })?;
    Ok((world, physics))
}
