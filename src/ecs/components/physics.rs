//! Body state components: rigid bodies and deformable node sets.

use glam::{DMat3, DVec3};

use crate::error::{CollisionError, CollisionResult};
use crate::math::lerp;

/// Rigid body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyType {
    /// Affected by gravity and contact corrections.
    Dynamic,
    /// Immovable.
    Static,
    /// Moved by the user. Collides but is never corrected.
    Kinematic,
}

/// Rigid body component.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub body_type: RigidBodyType,
    pub mass: f64,
    /// Principal moments of inertia in the body frame.
    pub inertia: DVec3,
    pub linear_velocity: DVec3,
    pub angular_velocity: DVec3,
    /// Gravity scale (default: 1.0).
    pub gravity_scale: f64,
}

impl RigidBody {
    /// Create a new dynamic rigid body with the given mass.
    pub fn new_dynamic(mass: f64) -> Self {
        // Unit sphere approximation
        Self {
            body_type: RigidBodyType::Dynamic,
            mass,
            inertia: DVec3::splat(mass),
            linear_velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            gravity_scale: 1.0,
        }
    }

    /// Create a new static rigid body.
    pub fn new_static() -> Self {
        Self {
            body_type: RigidBodyType::Static,
            mass: 0.0,
            inertia: DVec3::ZERO,
            linear_velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            gravity_scale: 0.0,
        }
    }

    /// Create a new kinematic rigid body.
    pub fn new_kinematic() -> Self {
        Self {
            body_type: RigidBodyType::Kinematic,
            ..Self::new_static()
        }
    }

    pub fn with_inertia(mut self, inertia: DVec3) -> Self {
        self.inertia = inertia;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: DVec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == RigidBodyType::Dynamic
    }

    /// Inverse mass, zero for anything that is not a dynamic body with positive mass.
    pub fn inverse_mass(&self) -> f64 {
        if self.is_dynamic() && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Inverse principal moments. A zero moment locks rotation about that axis.
    pub fn inverse_inertia(&self) -> DVec3 {
        if !self.is_dynamic() {
            return DVec3::ZERO;
        }
        let inv = |i: f64| if i > 0.0 { 1.0 / i } else { 0.0 };
        DVec3::new(inv(self.inertia.x), inv(self.inertia.y), inv(self.inertia.z))
    }

    /// World inverse inertia tensor `R I⁻¹ Rᵀ` for the body rotation `rotation`.
    pub fn world_inverse_inertia(&self, rotation: DMat3) -> DMat3 {
        rotation * DMat3::from_diagonal(self.inverse_inertia()) * rotation.transpose()
    }
}

/// Node positions of a deformable body at the start and end of the step interval.
///
/// The collision shape of the entity supplies the topology; its vertex `i` follows node `i`.
#[derive(Debug, Clone)]
pub struct DeformableBody {
    pub previous: Vec<DVec3>,
    pub current: Vec<DVec3>,
    pub velocities: Vec<DVec3>,
    /// Lumped inverse node masses. Zero pins a node.
    pub inverse_masses: Vec<f64>,
}

impl DeformableBody {
    /// A deformable body at rest at `positions`.
    pub fn new(positions: Vec<DVec3>, inverse_masses: Vec<f64>) -> CollisionResult<Self> {
        if positions.len() != inverse_masses.len() {
            return Err(CollisionError::NodeCountMismatch {
                expected: positions.len(),
                actual: inverse_masses.len(),
            });
        }
        Ok(Self {
            previous: positions.clone(),
            velocities: vec![DVec3::ZERO; positions.len()],
            current: positions,
            inverse_masses,
        })
    }

    /// A deformable body whose nodes all carry `node_mass`.
    pub fn with_uniform_mass(positions: Vec<DVec3>, node_mass: f64) -> Self {
        let inverse = if node_mass > 0.0 { 1.0 / node_mass } else { 0.0 };
        Self {
            previous: positions.clone(),
            velocities: vec![DVec3::ZERO; positions.len()],
            inverse_masses: vec![inverse; positions.len()],
            current: positions,
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.current.len()
    }

    /// Position of `node` at interval time `t`.
    #[inline]
    pub fn position_at(&self, node: usize, t: f64) -> DVec3 {
        lerp(self.previous[node], self.current[node], t)
    }

    pub fn positions_at(&self, t: f64) -> Vec<DVec3> {
        self.previous
            .iter()
            .zip(&self.current)
            .map(|(&p, &c)| lerp(p, c, t))
            .collect()
    }
}
