//! Collision components: the shape of an entity and its pose across the step.

use std::sync::Arc;

use glam::DAffine3;

use crate::collision::contact::DetectionType;
use crate::math::interpolate_pose;
use crate::shapes::Shape;

/// Collision shape component.
#[derive(Debug, Clone)]
pub struct Collider {
    pub shape: Arc<Shape>,
    /// Pairs involving a continuous collider are swept across the step.
    pub detection: DetectionType,
    /// Whether the broadphase also pairs this collider with itself.
    pub self_collision: bool,
}

impl Collider {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape: Arc::new(shape),
            detection: DetectionType::Discrete,
            self_collision: false,
        }
    }

    pub fn continuous(shape: Shape) -> Self {
        Self {
            detection: DetectionType::Continuous,
            ..Self::new(shape)
        }
    }

    /// Test the shape against itself too. Only segment meshes have a self-contact calculator.
    pub fn with_self_collision(mut self) -> Self {
        self.self_collision = true;
        self
    }
}

/// Rigid pose at the start (`previous`) and end (`current`) of the step interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseInterval {
    pub previous: DAffine3,
    pub current: DAffine3,
}

impl Default for PoseInterval {
    fn default() -> Self {
        Self::fixed(DAffine3::IDENTITY)
    }
}

impl PoseInterval {
    pub fn new(previous: DAffine3, current: DAffine3) -> Self {
        Self { previous, current }
    }

    /// An interval that does not move.
    pub fn fixed(pose: DAffine3) -> Self {
        Self::new(pose, pose)
    }

    /// Pose at interval time `t`.
    pub fn at(&self, t: f64) -> DAffine3 {
        interpolate_pose(&self.previous, &self.current, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_pose_interval_endpoints() {
        let interval = PoseInterval::new(
            DAffine3::from_translation(DVec3::ZERO),
            DAffine3::from_translation(DVec3::new(0.0, -2.0, 0.0)),
        );
        assert_eq!(interval.at(0.0), interval.previous);
        assert_eq!(interval.at(1.0), interval.current);
        let eps = 1e-12;
        assert!((interval.at(0.25).translation - DVec3::new(0.0, -0.5, 0.0)).length() < eps);
    }

    #[test]
    fn test_collider_detection() {
        assert_eq!(Collider::new(Shape::Plane).detection, DetectionType::Discrete);
        assert_eq!(
            Collider::continuous(Shape::Sphere { radius: 1.0 }).detection,
            DetectionType::Continuous
        );
        assert!(!Collider::new(Shape::Plane).self_collision);
        assert!(Collider::new(Shape::Plane).with_self_collision().self_collision);
    }
}
