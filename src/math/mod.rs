//! Geometric primitives, root solvers and pose helpers used by the collision core.
//!
//! Everything in this module is a pure function over `glam` double precision types.

pub mod aabb;
pub mod ccd;
pub mod geometry;
pub mod triangle_contact;

use glam::{DAffine3, DQuat, DVec3};

pub use aabb::Aabb;

/// Distance below which two points are considered coincident.
pub const DISTANCE_EPSILON: f64 = 1e-10;

/// Squared length below which a normal is treated as degenerate.
pub const NORMAL_EPSILON: f64 = 1e-16;

/// Linear interpolation between two points, exact at both ends.
#[inline]
pub fn lerp(a: DVec3, b: DVec3, t: f64) -> DVec3 {
    a * (1.0 - t) + b * t
}

/// Interpolate a rigid pose between `previous` (t = 0) and `current` (t = 1).
///
/// Translation is interpolated linearly and rotation spherically. The endpoints are returned
/// untouched when `t` is within machine epsilon of 0 or 1.
pub fn interpolate_pose(previous: &DAffine3, current: &DAffine3, t: f64) -> DAffine3 {
    if t <= f64::EPSILON {
        return *previous;
    }
    if t >= 1.0 - f64::EPSILON {
        return *current;
    }
    let q0 = DQuat::from_mat3(&previous.matrix3).normalize();
    let q1 = DQuat::from_mat3(&current.matrix3).normalize();
    let rotation = q0.slerp(q1, t).normalize();
    let translation = lerp(previous.translation, current.translation, t);
    DAffine3::from_rotation_translation(rotation, translation)
}

/// Unit normal of the triangle `(v0, v1, v2)`, or zero when the triangle is degenerate.
#[inline]
pub fn triangle_normal(v0: DVec3, v1: DVec3, v2: DVec3) -> DVec3 {
    let n = (v1 - v0).cross(v2 - v0);
    if n.length_squared() <= NORMAL_EPSILON {
        DVec3::ZERO
    } else {
        n.normalize()
    }
}
