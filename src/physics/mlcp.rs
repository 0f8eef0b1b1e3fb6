//! Assembly of the mixed linear complementarity problem from contact constraints.
//!
//! Backward Euler velocity formulation. For a row with normal `n` and a side of sign `s`:
//!
//! - rigid body at point `p` with center `c`: `H = s dt [nᵀ, ((p - c) × n)ᵀ]`, compliance
//!   `C = diag(m⁻¹ I, R I⁻¹ Rᵀ)`
//! - deformable node `k` with weight `w`: `H_k = s dt w nᵀ`, compliance `C_k = m_k⁻¹ I`
//!
//! The system is `A = Σ H C Hᵀ` over sides sharing a representation and `b` the signed
//! separation at the end of the interval minus the contact tolerance.

use glam::{DMat3, DQuat, DVec3};
use nalgebra::{DMatrix, DVector};

use crate::ecs::components::{Collider, DeformableBody, PoseInterval, RigidBody};
use crate::error::{CollisionError, CollisionResult};

use super::constraint::{ConstraintSide, ConstraintType, ContactConstraint};
use super::representation::{localize, node_weights, surface_offset};

/// Jacobian of one constraint side, paired with the compliance of its representation.
#[derive(Debug, Clone, PartialEq)]
pub enum SideJacobian {
    /// Static, kinematic or otherwise immovable.
    Fixed,
    Rigid {
        entity: hecs::Entity,
        linear: DVec3,
        angular: DVec3,
        inverse_mass: f64,
        inverse_inertia: DMat3,
    },
    Deformable {
        entity: hecs::Entity,
        /// `(node, row block, inverse node mass)`.
        nodes: Vec<(usize, DVec3, f64)>,
    },
}

impl SideJacobian {
    /// `H_self C H_otherᵀ`, zero unless both sides act on the same representation.
    fn coupling(&self, other: &SideJacobian) -> f64 {
        match (self, other) {
            (
                SideJacobian::Rigid {
                    entity,
                    linear,
                    angular,
                    inverse_mass,
                    inverse_inertia,
                },
                SideJacobian::Rigid {
                    entity: other_entity,
                    linear: other_linear,
                    angular: other_angular,
                    ..
                },
            ) if entity == other_entity => {
                linear.dot(*other_linear) * inverse_mass
                    + angular.dot(*inverse_inertia * *other_angular)
            }
            (
                SideJacobian::Deformable { entity, nodes },
                SideJacobian::Deformable {
                    entity: other_entity,
                    nodes: other_nodes,
                },
            ) if entity == other_entity => nodes
                .iter()
                .flat_map(|(node, row, inverse_mass)| {
                    other_nodes
                        .iter()
                        .filter(move |(other_node, _, _)| other_node == node)
                        .map(move |(_, other_row, _)| row.dot(*other_row) * inverse_mass)
                })
                .sum(),
            _ => 0.0,
        }
    }
}

/// An assembled problem: find `x` with `w = A x + b`, `x ≥ 0`, `w ≥ 0`, `xᵀ w = 0` for
/// contact rows and `w = 0` for bilateral rows.
#[derive(Debug, Clone)]
pub struct MlcpProblem {
    pub a: DMatrix<f64>,
    pub b: DVector<f64>,
    pub constraint_types: Vec<ConstraintType>,
    /// Jacobians of both sides of every row, used to push the solution back.
    pub jacobians: Vec<[SideJacobian; 2]>,
}

impl MlcpProblem {
    #[inline]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }
}

fn side_jacobian(
    world: &hecs::World,
    side: &ConstraintSide,
    normal: DVec3,
    position: DVec3,
    dt: f64,
) -> CollisionResult<SideJacobian> {
    let row = normal * side.scale * dt;

    if let Ok(body) = world.get::<&DeformableBody>(side.entity) {
        let collider = world
            .get::<&Collider>(side.entity)
            .map_err(|_| CollisionError::MissingComponent {
                details: format!("Collider on {:?}", side.entity),
            })?;
        let weights = node_weights(&collider.shape, &side.location).ok_or_else(|| {
            CollisionError::UnresolvableLocation {
                details: format!("no element or node coordinate on {:?}", side.entity),
            }
        })?;
        let nodes = weights
            .into_iter()
            .filter_map(|(node, weight)| {
                let inverse_mass = *body.inverse_masses.get(node)?;
                (inverse_mass > 0.0).then_some((node, row * weight, inverse_mass))
            })
            .collect::<Vec<_>>();
        return Ok(if nodes.is_empty() {
            SideJacobian::Fixed
        } else {
            SideJacobian::Deformable {
                entity: side.entity,
                nodes,
            }
        });
    }

    let Ok(body) = world.get::<&RigidBody>(side.entity) else {
        return Ok(SideJacobian::Fixed);
    };
    if !body.is_dynamic() {
        return Ok(SideJacobian::Fixed);
    }
    let pose = world
        .get::<&PoseInterval>(side.entity)
        .map_err(|_| CollisionError::MissingComponent {
            details: format!("PoseInterval on {:?}", side.entity),
        })?
        .current;
    let rotation = DMat3::from_quat(DQuat::from_mat3(&pose.matrix3).normalize());
    let arm = position - pose.translation;

    Ok(SideJacobian::Rigid {
        entity: side.entity,
        linear: row,
        angular: arm.cross(normal) * side.scale * dt,
        inverse_mass: body.inverse_mass(),
        inverse_inertia: body.world_inverse_inertia(rotation),
    })
}

/// Assemble the problem for `constraints`, evaluating every location at the end of the
/// interval.
pub fn build_mlcp(
    world: &hecs::World,
    constraints: &[ContactConstraint],
    dt: f64,
    contact_tolerance: f64,
) -> CollisionResult<MlcpProblem> {
    let n = constraints.len();
    let mut b = DVector::zeros(n);
    let mut jacobians = Vec::with_capacity(n);

    for (i, constraint) in constraints.iter().enumerate() {
        let [first, second] = &constraint.sides;
        let position_first = localize(world, first.entity, &first.location, 1.0)?;
        let position_second = localize(world, second.entity, &second.location, 1.0)?;
        let radii = surface_offset(world, first.entity, &first.location)
            + surface_offset(world, second.entity, &second.location);

        b[i] = constraint.normal.dot(position_first - position_second) - radii - contact_tolerance;
        jacobians.push([
            side_jacobian(world, first, constraint.normal, position_first, dt)?,
            side_jacobian(world, second, constraint.normal, position_second, dt)?,
        ]);
    }

    let mut a = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let mut value = 0.0;
            for side_i in &jacobians[i] {
                for side_j in &jacobians[j] {
                    value += side_i.coupling(side_j);
                }
            }
            a[(i, j)] = value;
            a[(j, i)] = value;
        }
    }

    Ok(MlcpProblem {
        a,
        b,
        constraint_types: constraints.iter().map(|c| c.constraint_type).collect(),
        jacobians,
    })
}
