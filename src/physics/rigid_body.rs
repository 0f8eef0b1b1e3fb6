//! Free motion of rigid bodies and deformable nodes across one step.

use glam::{DMat3, DQuat, DVec3};

use crate::ecs::components::{DeformableBody, PoseInterval, RigidBody};

/// Start a new step: the last end state becomes the interval start and the end is predicted
/// by semi-implicit Euler under gravity.
///
/// Only dynamic rigid bodies move; deformable nodes with zero inverse mass stay pinned.
pub fn integrate_free_motion(world: &mut hecs::World, gravity: DVec3, dt: f64) {
    for (_, (rb, poses)) in world.query_mut::<(&mut RigidBody, &mut PoseInterval)>() {
        poses.previous = poses.current;
        if !rb.is_dynamic() {
            continue;
        }

        rb.linear_velocity += gravity * rb.gravity_scale * dt;
        poses.current.translation += rb.linear_velocity * dt;

        let omega = rb.angular_velocity;
        if omega.length_squared() > 1e-20 {
            let spin = DQuat::from_scaled_axis(omega * dt);
            poses.current.matrix3 = DMat3::from_quat(spin) * poses.current.matrix3;
        }
    }

    for (_, body) in world.query_mut::<&mut DeformableBody>() {
        let DeformableBody {
            previous,
            current,
            velocities,
            inverse_masses,
        } = body;
        previous.clone_from(current);
        for ((position, velocity), &inverse_mass) in current
            .iter_mut()
            .zip(velocities.iter_mut())
            .zip(inverse_masses.iter())
        {
            if inverse_mass <= 0.0 {
                continue;
            }
            *velocity += gravity * dt;
            *position += *velocity * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DAffine3;

    #[test]
    fn test_free_fall() {
        let mut world = hecs::World::new();
        let entity = world.spawn((
            PoseInterval::fixed(DAffine3::from_translation(DVec3::new(0.0, 10.0, 0.0))),
            RigidBody::new_dynamic(1.0),
        ));

        let gravity = DVec3::new(0.0, -9.81, 0.0);
        let dt = 1.0 / 60.0;
        for _ in 0..60 {
            integrate_free_motion(&mut world, gravity, dt);
        }

        let poses = world.get::<&PoseInterval>(entity).unwrap();
        // Semi-implicit Euler lands slightly below the analytic 10 - 0.5 g = 5.095
        let y = poses.current.translation.y;
        assert!(y < 5.095 && y > 4.9, "Body should have fallen about 4.9 m: y = {y}");
        assert!(poses.previous.translation.y > y);

        let eps = 1e-12;
        assert!(poses.current.translation.x.abs() < eps);
        assert!(poses.current.translation.z.abs() < eps);
    }

    #[test]
    fn test_static_body_unaffected() {
        let mut world = hecs::World::new();
        let entity = world.spawn((PoseInterval::default(), RigidBody::new_static()));
        for _ in 0..60 {
            integrate_free_motion(&mut world, DVec3::new(0.0, -9.81, 0.0), 1.0 / 60.0);
        }
        assert_eq!(*world.get::<&PoseInterval>(entity).unwrap(), PoseInterval::default());
    }

    #[test]
    fn test_spin_rotates_pose() {
        let mut world = hecs::World::new();
        let mut body = RigidBody::new_dynamic(1.0);
        body.angular_velocity = DVec3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0);
        let entity = world.spawn((PoseInterval::default(), body));

        integrate_free_motion(&mut world, DVec3::ZERO, 1.0);
        let poses = world.get::<&PoseInterval>(entity).unwrap();
        let x = poses.current.transform_vector3(DVec3::X);
        let eps = 1e-9;
        assert!((x - DVec3::new(0.0, 0.0, -1.0)).length() < eps, "x axis maps to {x}");
    }

    #[test]
    fn test_deformable_pinned_nodes() {
        let mut world = hecs::World::new();
        let body = DeformableBody::new(vec![DVec3::ZERO, DVec3::X], vec![0.0, 1.0]).unwrap();
        let entity = world.spawn((body,));

        integrate_free_motion(&mut world, DVec3::new(0.0, -10.0, 0.0), 0.1);
        let body = world.get::<&DeformableBody>(entity).unwrap();
        assert_eq!(body.current[0], DVec3::ZERO);
        let eps = 1e-12;
        assert!((body.current[1] - DVec3::new(1.0, -0.1, 0.0)).length() < eps);
        assert_eq!(body.previous[1], DVec3::X);
    }
}
