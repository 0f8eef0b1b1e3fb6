//! Application of solved contact multipliers to body state.

use glam::{DMat3, DQuat, DVec3};
use tracing::trace;

use crate::ecs::components::{DeformableBody, PoseInterval, RigidBody};

use super::mlcp::{MlcpProblem, SideJacobian};
use super::solver::MlcpSolution;

/// Apply `λ = solution.x` to every side of every row: `Δv = C Hᵀ λ`, and the end of the
/// interval moves by `dt Δv`.
pub fn push_results(
    world: &mut hecs::World,
    problem: &MlcpProblem,
    solution: &MlcpSolution,
    dt: f64,
) {
    for (sides, &lambda) in problem.jacobians.iter().zip(solution.x.iter()) {
        if lambda == 0.0 {
            continue;
        }
        for side in sides {
            push_side(world, side, lambda, dt);
        }
    }
}

fn push_side(world: &mut hecs::World, side: &SideJacobian, lambda: f64, dt: f64) {
    match side {
        SideJacobian::Fixed => {}
        SideJacobian::Rigid {
            entity,
            linear,
            angular,
            inverse_mass,
            inverse_inertia,
        } => {
            let delta_v = *linear * (*inverse_mass * lambda);
            let delta_w = *inverse_inertia * (*angular * lambda);
            if let Ok(mut body) = world.get::<&mut RigidBody>(*entity) {
                body.linear_velocity += delta_v;
                body.angular_velocity += delta_w;
            }
            if let Ok(mut poses) = world.get::<&mut PoseInterval>(*entity) {
                poses.current.translation += delta_v * dt;
                let spin = DQuat::from_scaled_axis(delta_w * dt);
                poses.current.matrix3 = DMat3::from_quat(spin) * poses.current.matrix3;
            }
            trace!(?entity, lambda, ?delta_v, "rigid push");
        }
        SideJacobian::Deformable { entity, nodes } => {
            let Ok(mut body) = world.get::<&mut DeformableBody>(*entity) else {
                return;
            };
            for &(node, row, inverse_mass) in nodes {
                let delta_v: DVec3 = row * (inverse_mass * lambda);
                body.velocities[node] += delta_v;
                body.current[node] += delta_v * dt;
            }
        }
    }
}
