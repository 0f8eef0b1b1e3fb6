//! Segment mesh against segment mesh, and a segment mesh against itself.
//!
//! Penetration points always sit on the segment centerlines. The constraint layer subtracts
//! both radii when it measures the separation of a segment-mesh contact.

use glam::{DAffine3, DVec3};
use tracing::trace;

use super::world_segment_mesh;
use crate::collision::calculator::{ContactCalculator, PosedInterval, PosedShape};
use crate::collision::contact::Contact;
use crate::collision::location::Location;
use crate::collision::pool::ShapePool;
use crate::math::geometry::{closest_points_segment_segment, SegmentClosestPoints};
use crate::math::{lerp, Aabb, DISTANCE_EPSILON};
use crate::shapes::{AabbTree, SegmentMeshShape, ShapeKind};

/// Separation direction for two centerline points, falling back to the segment cross product.
fn separation_normal(closest: &SegmentClosestPoints, a: [DVec3; 2], b: [DVec3; 2]) -> DVec3 {
    if closest.distance > DISTANCE_EPSILON {
        return (closest.point_a - closest.point_b) / closest.distance;
    }
    let (da, db) = (a[1] - a[0], b[1] - b[0]);
    da.cross(db)
        .try_normalize()
        .or_else(|| da.try_normalize().map(|d| d.any_orthonormal_vector()))
        .unwrap_or(DVec3::Y)
}

fn swept_tree(start: &SegmentMeshShape, end: &SegmentMeshShape) -> AabbTree {
    let boxes = (0..start.segment_count())
        .map(|i| {
            let (s, e) = (start.segment(i), end.segment(i));
            Aabb::from_points([s[0], s[1], e[0], e[1]]).inflate(start.radius().max(end.radius()))
        })
        .collect();
    AabbTree::new(boxes)
}

fn shares_vertex(mesh: &SegmentMeshShape, i: usize, j: usize) -> bool {
    let (a, b) = (mesh.segments()[i], mesh.segments()[j]);
    a.iter().any(|v| b.contains(v))
}

/// One segment moving linearly between its endpoints at t = 0 and t = 1.
#[derive(Debug, Clone, Copy)]
struct SweptSegment {
    start: [DVec3; 2],
    end: [DVec3; 2],
}

impl SweptSegment {
    fn new(start: &SegmentMeshShape, end: &SegmentMeshShape, index: usize) -> Self {
        Self {
            start: start.segment(index),
            end: end.segment(index),
        }
    }

    fn at(&self, t: f64) -> [DVec3; 2] {
        [
            lerp(self.start[0], self.end[0], t),
            lerp(self.start[1], self.end[1], t),
        ]
    }

    fn displacement(&self, endpoint: usize) -> DVec3 {
        self.end[endpoint] - self.start[endpoint]
    }
}

/// Upper bound on how fast the centerline distance of two swept segments changes over the
/// interval.
///
/// The relative velocity of any two centerline points is bilinear in their segment
/// parameters, so its largest magnitude is reached at a pair of endpoints.
fn distance_rate_bound(a: &SweptSegment, b: &SweptSegment) -> f64 {
    let mut bound = 0.0f64;
    for i in 0..2 {
        for j in 0..2 {
            bound = bound.max((a.displacement(i) - b.displacement(j)).length());
        }
    }
    bound
}

fn discrete_contact(
    (i, j): (usize, usize),
    sa: [DVec3; 2],
    sb: [DVec3; 2],
    radius_sum: f64,
    (to_a, to_b): (&DAffine3, &DAffine3),
) -> Option<Contact> {
    let closest = closest_points_segment_segment(sa[0], sa[1], sb[0], sb[1]);
    if closest.distance >= radius_sum {
        return None;
    }
    let normal = separation_normal(&closest, sa, sb);
    Some(Contact::discrete(
        radius_sum - closest.distance,
        (closest.point_a + closest.point_b) * 0.5,
        normal,
        (
            Location::on_segment(i, closest.s)
                .with_rigid_local_position(to_a.transform_point3(closest.point_a)),
            Location::on_segment(j, closest.t)
                .with_rigid_local_position(to_b.transform_point3(closest.point_b)),
        ),
    ))
}

/// Segment mesh against segment mesh.
///
/// Also handles a segment mesh against itself, skipping every segment pair that shares a
/// vertex.
#[derive(Debug, Clone, Copy)]
pub struct SegmentMeshContact {
    /// Bisection steps refining the first time the swept surfaces touch.
    ///
    /// Default: 50.
    pub bisection_steps: usize,
    /// Smallest time step taken while searching for the first touch. Contacts lasting less
    /// than this may be missed.
    ///
    /// Default: 1e-6.
    pub time_precision: f64,
    /// Self contacts of a segment whose vertices move this far or more across the interval
    /// are not reported.
    ///
    /// Default: unbounded.
    pub max_self_motion: f64,
}

impl Default for SegmentMeshContact {
    fn default() -> Self {
        Self {
            bisection_steps: 50,
            time_precision: 1e-6,
            max_self_motion: f64::INFINITY,
        }
    }
}

impl SegmentMeshContact {
    /// First time in `[0, 1]` at which the centerlines come within `radius_sum`.
    fn first_touch(&self, a: &SweptSegment, b: &SweptSegment, radius_sum: f64) -> Option<f64> {
        let distance = |t: f64| {
            let (pa, pb) = (a.at(t), b.at(t));
            closest_points_segment_segment(pa[0], pa[1], pb[0], pb[1]).distance
        };
        if distance(0.0) < radius_sum {
            return Some(0.0);
        }
        let rate = distance_rate_bound(a, b);
        if rate <= 0.0 {
            return None;
        }

        // The gap cannot close faster than `rate`, so every advance stays before the touch
        let min_step = self.time_precision.max(1e-12);
        let (mut lo, mut hi) = (0.0, 0.0);
        loop {
            let gap = distance(hi) - radius_sum;
            if gap <= 0.0 {
                break;
            }
            if hi >= 1.0 {
                return None;
            }
            lo = hi;
            hi = (hi + (gap / rate).max(min_step)).min(1.0);
        }

        for _ in 0..self.bisection_steps {
            let mid = 0.5 * (lo + hi);
            if distance(mid) <= radius_sum {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Some(hi)
    }

    fn interval_contact(
        &self,
        (i, j): (usize, usize),
        (a, b): (&SweptSegment, &SweptSegment),
        radius_sum: f64,
        (end_pose_a, end_pose_b): (&DAffine3, &DAffine3),
    ) -> Option<Contact> {
        let time = self.first_touch(a, b, radius_sum)?;
        let (pa, pb) = (a.at(time), b.at(time));
        let closest = closest_points_segment_segment(pa[0], pa[1], pb[0], pb[1]);

        let normal = separation_normal(&closest, pa, pb);
        let end_point_a = lerp(a.end[0], a.end[1], closest.s);
        let end_point_b = lerp(b.end[0], b.end[1], closest.t);
        let depth = (radius_sum - normal.dot(end_point_a - end_point_b)).max(0.0);

        Some(Contact::continuous(
            time,
            depth,
            (end_point_a + end_point_b) * 0.5,
            normal,
            (
                Location::on_segment(i, closest.s)
                    .with_rigid_local_position(end_pose_a.inverse().transform_point3(end_point_a)),
                Location::on_segment(j, closest.t)
                    .with_rigid_local_position(end_pose_b.inverse().transform_point3(end_point_b)),
            ),
        ))
    }

    fn moves_too_far(&self, start: &SegmentMeshShape, end: &SegmentMeshShape, i: usize) -> bool {
        start.segments()[i]
            .iter()
            .any(|&v| start.vertices()[v].distance(end.vertices()[v]) >= self.max_self_motion)
    }
}

impl ContactCalculator for SegmentMeshContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::SegmentMesh, ShapeKind::SegmentMesh)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Some(mesh_a), Some(mesh_b)) = (world_segment_mesh(a), world_segment_mesh(b)) else {
            return Vec::new();
        };
        let radius_sum = mesh_a.radius() + mesh_b.radius();
        let (to_a, to_b) = (a.pose.inverse(), b.pose.inverse());

        mesh_a
            .tree()
            .spatial_join(mesh_b.tree())
            .into_iter()
            .filter_map(|(i, j)| {
                let (sa, sb) = (mesh_a.segment(i), mesh_b.segment(j));
                discrete_contact((i, j), sa, sb, radius_sum, (&to_a, &to_b))
            })
            .collect()
    }

    fn supports_ccd(&self) -> bool {
        true
    }

    fn ccd_contacts(
        &self,
        a: &PosedInterval,
        b: &PosedInterval,
        _pool: &mut ShapePool,
    ) -> Vec<Contact> {
        let (Some(start_a), Some(end_a), Some(start_b), Some(end_b)) = (
            world_segment_mesh(&a.start),
            world_segment_mesh(&a.end),
            world_segment_mesh(&b.start),
            world_segment_mesh(&b.end),
        ) else {
            return Vec::new();
        };
        debug_assert_eq!(
            start_a.segments(),
            end_a.segments(),
            "segment topology changed across the interval"
        );
        debug_assert_eq!(
            start_b.segments(),
            end_b.segments(),
            "segment topology changed across the interval"
        );

        let radius_sum = start_a.radius() + start_b.radius();
        let candidates = swept_tree(&start_a, &end_a).spatial_join(&swept_tree(&start_b, &end_b));
        trace!(candidates = candidates.len(), "segment mesh ccd");

        candidates
            .into_iter()
            .filter_map(|(i, j)| {
                let swept_a = SweptSegment::new(&start_a, &end_a, i);
                let swept_b = SweptSegment::new(&start_b, &end_b, j);
                self.interval_contact(
                    (i, j),
                    (&swept_a, &swept_b),
                    radius_sum,
                    (&a.end.pose, &b.end.pose),
                )
            })
            .collect()
    }

    fn supports_self_contact(&self) -> bool {
        true
    }

    fn dcd_self_contacts(&self, shape: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let Some(mesh) = world_segment_mesh(shape) else {
            return Vec::new();
        };
        let radius_sum = 2.0 * mesh.radius();
        let to_local = shape.pose.inverse();

        mesh.tree()
            .spatial_join(mesh.tree())
            .into_iter()
            .filter(|&(i, j)| i < j && !shares_vertex(&mesh, i, j))
            .filter_map(|(i, j)| {
                let (sa, sb) = (mesh.segment(i), mesh.segment(j));
                discrete_contact((i, j), sa, sb, radius_sum, (&to_local, &to_local))
            })
            .collect()
    }

    fn ccd_self_contacts(&self, shape: &PosedInterval, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Some(start), Some(end)) =
            (world_segment_mesh(&shape.start), world_segment_mesh(&shape.end))
        else {
            return Vec::new();
        };
        debug_assert_eq!(
            start.segments(),
            end.segments(),
            "segment topology changed across the interval"
        );

        let radius_sum = 2.0 * start.radius();
        let tree = swept_tree(&start, &end);
        let candidates: Vec<_> = tree
            .spatial_join(&tree)
            .into_iter()
            .filter(|&(i, j)| i < j && !shares_vertex(&start, i, j))
            .collect();
        trace!(candidates = candidates.len(), "segment mesh self ccd");

        candidates
            .into_iter()
            .filter(|&(i, j)| {
                let keep = !self.moves_too_far(&start, &end, i)
                    && !self.moves_too_far(&start, &end, j);
                if !keep {
                    trace!(i, j, "self contact candidate moves too far");
                }
                keep
            })
            .filter_map(|(i, j)| {
                let swept_i = SweptSegment::new(&start, &end, i);
                let swept_j = SweptSegment::new(&start, &end, j);
                self.interval_contact(
                    (i, j),
                    (&swept_i, &swept_j),
                    radius_sum,
                    (&shape.end.pose, &shape.end.pose),
                )
            })
            .collect()
    }
}
