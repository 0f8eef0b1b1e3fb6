//! Calculators between analytic shapes: spheres, planes, boxes and capsules.

use glam::{DAffine3, DVec3};

use super::{capsule_dimensions, capsule_segment, plane_normal, sphere_radius, Penetration};
use crate::collision::calculator::{ContactCalculator, PosedShape};
use crate::collision::contact::Contact;
use crate::collision::pool::ShapePool;
use crate::math::geometry::closest_points_segment_segment;
use crate::math::DISTANCE_EPSILON;
use crate::shapes::{Shape, ShapeKind};

/// Golden-section steps used to minimize the segment-box distance.
const SEGMENT_SEARCH_STEPS: usize = 100;

/// Sphere-sphere penetration, A being the sphere at `center_a`.
pub fn sphere_sphere(
    center_a: DVec3,
    radius_a: f64,
    center_b: DVec3,
    radius_b: f64,
) -> Option<Penetration> {
    let diff = center_a - center_b;
    let dist_sq = diff.length_squared();
    let min_dist = radius_a + radius_b;

    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > DISTANCE_EPSILON { diff / dist } else { DVec3::Y };

    Some(Penetration {
        depth: min_dist - dist,
        normal,
        point_a: center_a - normal * radius_a,
        point_b: center_b + normal * radius_b,
    })
}

/// Sphere-plane penetration, the plane being +Y of `plane_pose` through its origin.
pub fn sphere_plane(center: DVec3, radius: f64, plane_pose: &DAffine3) -> Option<Penetration> {
    let normal = plane_normal(plane_pose);
    let distance = (center - plane_pose.translation).dot(normal);
    if distance >= radius {
        return None;
    }
    Some(Penetration {
        depth: radius - distance,
        normal,
        point_a: center - normal * radius,
        point_b: center - normal * distance,
    })
}

/// Box-sphere penetration, A being the box.
pub fn box_sphere(
    half_extents: DVec3,
    box_pose: &DAffine3,
    center: DVec3,
    radius: f64,
) -> Option<Penetration> {
    let c = box_pose.inverse().transform_point3(center);
    let closest = c.clamp(-half_extents, half_extents);
    let dist = (closest - c).length();

    let (normal_local, depth) = if dist > DISTANCE_EPSILON {
        if dist >= radius {
            return None;
        }
        ((closest - c) / dist, radius - dist)
    } else {
        // Center inside the box: leave through the nearest face
        let face_gap = half_extents - c.abs();
        let axis = if face_gap.x <= face_gap.y && face_gap.x <= face_gap.z {
            0
        } else if face_gap.y <= face_gap.z {
            1
        } else {
            2
        };
        let mut outward = DVec3::ZERO;
        outward[axis] = if c[axis] >= 0.0 { 1.0 } else { -1.0 };
        (-outward, radius + face_gap[axis])
    };

    let sphere_point = c + normal_local * radius;
    Some(Penetration {
        depth,
        normal: box_pose.transform_vector3(normal_local),
        point_a: box_pose.transform_point3(sphere_point - normal_local * depth),
        point_b: box_pose.transform_point3(sphere_point),
    })
}

fn distance_to_box(p: DVec3, half_extents: DVec3) -> f64 {
    (p.clamp(-half_extents, half_extents) - p).length()
}

/// Box-capsule penetration, A being the box and the capsule running along its local Y.
pub fn box_capsule(
    half_extents: DVec3,
    box_pose: &DAffine3,
    capsule_pose: &DAffine3,
    radius: f64,
    half_height: f64,
) -> Option<Penetration> {
    let to_box = box_pose.inverse();
    let (start, end) = capsule_segment(capsule_pose, half_height);
    let p0 = to_box.transform_point3(start);
    let p1 = to_box.transform_point3(end);

    // The distance from a point of the segment to the box is convex along the segment
    let inv_phi = (5.0_f64.sqrt() - 1.0) * 0.5;
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..SEGMENT_SEARCH_STEPS {
        let m1 = hi - (hi - lo) * inv_phi;
        let m2 = lo + (hi - lo) * inv_phi;
        if distance_to_box(p0.lerp(p1, m1), half_extents)
            <= distance_to_box(p0.lerp(p1, m2), half_extents)
        {
            hi = m2;
        } else {
            lo = m1;
        }
    }
    let core = p0.lerp(p1, (lo + hi) * 0.5);
    let closest = core.clamp(-half_extents, half_extents);
    let dist = (closest - core).length();

    let (normal_local, depth, capsule_point) = if dist > DISTANCE_EPSILON {
        if dist >= radius {
            return None;
        }
        let n = (closest - core) / dist;
        (n, radius - dist, core + n * radius)
    } else {
        // The core segment reaches into the box: separate along the cheapest face normal
        let mut best: Option<(f64, DVec3, DVec3)> = None;
        for axis in 0..3 {
            for sign in [1.0, -1.0] {
                let mut outward = DVec3::ZERO;
                outward[axis] = sign;
                let lowest = if p0.dot(outward) <= p1.dot(outward) { p0 } else { p1 };
                let depth = half_extents[axis] + radius - lowest.dot(outward);
                if best.map_or(true, |(d, _, _)| depth < d) {
                    best = Some((depth, outward, lowest));
                }
            }
        }
        let (depth, outward, lowest) = best?;
        (-outward, depth, lowest - outward * radius)
    };

    Some(Penetration {
        depth,
        normal: box_pose.transform_vector3(normal_local),
        point_a: box_pose.transform_point3(capsule_point - normal_local * depth),
        point_b: box_pose.transform_point3(capsule_point),
    })
}

/// Capsule-capsule penetration.
pub fn capsule_capsule(
    pose_a: &DAffine3,
    radius_a: f64,
    half_height_a: f64,
    pose_b: &DAffine3,
    radius_b: f64,
    half_height_b: f64,
) -> Option<Penetration> {
    let (a0, a1) = capsule_segment(pose_a, half_height_a);
    let (b0, b1) = capsule_segment(pose_b, half_height_b);
    let closest = closest_points_segment_segment(a0, a1, b0, b1);
    let min_dist = radius_a + radius_b;
    if closest.distance >= min_dist {
        return None;
    }

    let normal = if closest.distance > DISTANCE_EPSILON {
        (closest.point_a - closest.point_b) / closest.distance
    } else {
        let n = (a1 - a0).cross(b1 - b0);
        if n.length_squared() > DISTANCE_EPSILON {
            n.normalize()
        } else {
            (a1 - a0).any_orthonormal_vector()
        }
    };

    Some(Penetration {
        depth: min_dist - closest.distance,
        normal,
        point_a: closest.point_a - normal * radius_a,
        point_b: closest.point_b + normal * radius_b,
    })
}

/// Sphere against sphere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SphereSphereContact;

impl ContactCalculator for SphereSphereContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Sphere, ShapeKind::Sphere)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Some(ra), Some(rb)) = (sphere_radius(&a.shape), sphere_radius(&b.shape)) else {
            return Vec::new();
        };
        sphere_sphere(a.pose.translation, ra, b.pose.translation, rb)
            .map(|p| p.into_contact(&a.pose, &b.pose))
            .into_iter()
            .collect()
    }
}

/// Sphere against an infinite plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpherePlaneContact;

impl ContactCalculator for SpherePlaneContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Sphere, ShapeKind::Plane)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let Some(radius) = sphere_radius(&a.shape) else {
            return Vec::new();
        };
        sphere_plane(a.pose.translation, radius, &b.pose)
            .map(|p| p.into_contact(&a.pose, &b.pose))
            .into_iter()
            .collect()
    }
}

/// Box against sphere.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxSphereContact;

impl ContactCalculator for BoxSphereContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Box, ShapeKind::Sphere)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Shape::Box { half_extents }, Some(radius)) = (
            a.shape.as_ref(),
            sphere_radius(&b.shape),
        ) else {
            return Vec::new();
        };
        box_sphere(*half_extents, &a.pose, b.pose.translation, radius)
            .map(|p| p.into_contact(&a.pose, &b.pose))
            .into_iter()
            .collect()
    }
}

/// Box against capsule.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxCapsuleContact;

impl ContactCalculator for BoxCapsuleContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Box, ShapeKind::Capsule)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Shape::Box { half_extents }, Some((radius, half_height))) =
            (a.shape.as_ref(), capsule_dimensions(&b.shape))
        else {
            return Vec::new();
        };
        box_capsule(*half_extents, &a.pose, &b.pose, radius, half_height)
            .map(|p| p.into_contact(&a.pose, &b.pose))
            .into_iter()
            .collect()
    }
}

/// Capsule against capsule.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapsuleCapsuleContact;

impl ContactCalculator for CapsuleCapsuleContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Capsule, ShapeKind::Capsule)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Some((ra, ha)), Some((rb, hb))) = (
            capsule_dimensions(&a.shape),
            capsule_dimensions(&b.shape),
        )
        else {
            return Vec::new();
        };
        capsule_capsule(&a.pose, ra, ha, &b.pose, rb, hb)
            .map(|p| p.into_contact(&a.pose, &b.pose))
            .into_iter()
            .collect()
    }
}
