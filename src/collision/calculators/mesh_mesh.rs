//! Triangle mesh against triangle mesh, discrete and continuous.

use glam::{DAffine3, DVec3};
use tracing::{trace, warn};

use super::world_mesh;
use crate::collision::calculator::{ContactCalculator, PosedInterval, PosedShape};
use crate::collision::contact::Contact;
use crate::collision::location::Location;
use crate::collision::pool::ShapePool;
use crate::math::ccd::{ccd_point_triangle, ccd_segment_segment, Sweep};
use crate::math::geometry::{barycentric_coordinates, distance_triangle_triangle};
use crate::math::triangle_contact::calculate_contact_triangle_triangle;
use crate::math::{triangle_normal, Aabb, DISTANCE_EPSILON};
use crate::shapes::{AabbTree, MeshShape, ShapeKind};

/// A mesh in world space at both ends of an interval, with the pose it ends at.
#[derive(Debug, Clone, Copy)]
pub struct MeshSweep<'a> {
    pub start: &'a MeshShape,
    pub end: &'a MeshShape,
    pub end_pose: DAffine3,
}

/// Discrete contacts between two meshes whose vertices are in world space.
///
/// `pose_a` and `pose_b` only express the penetration points in each rigid frame.
pub fn mesh_mesh_dcd(
    a: &MeshShape,
    pose_a: &DAffine3,
    b: &MeshShape,
    pose_b: &DAffine3,
) -> Vec<Contact> {
    let to_a = pose_a.inverse();
    let to_b = pose_b.inverse();
    let mut contacts = Vec::new();
    let mut degenerate = 0;

    for (i, j) in a.tree().spatial_join(b.tree()) {
        let (normal_a, normal_b) = (a.normal(i), b.normal(j));
        if normal_a == DVec3::ZERO || normal_b == DVec3::ZERO {
            degenerate += 1;
            continue;
        }
        let (tri_a, tri_b) = (a.triangle(i), b.triangle(j));
        let Some(contact) = calculate_contact_triangle_triangle(
            &tri_a,
            normal_a,
            &tri_b,
            normal_b,
        ) else {
            continue;
        };
        let (Some(weights_a), Some(weights_b)) = (
            barycentric_coordinates(contact.point_a, tri_a[0], tri_a[1], tri_a[2]),
            barycentric_coordinates(contact.point_b, tri_b[0], tri_b[1], tri_b[2]),
        ) else {
            continue;
        };
        contacts.push(Contact::discrete(
            contact.depth.abs(),
            (contact.point_a + contact.point_b) * 0.5,
            contact.normal,
            (
                Location::on_triangle(i, weights_a)
                    .with_rigid_local_position(to_a.transform_point3(contact.point_a)),
                Location::on_triangle(j, weights_b)
                    .with_rigid_local_position(to_b.transform_point3(contact.point_b)),
            ),
        ));
    }

    if degenerate > 0 {
        warn!(degenerate, "skipped triangle pairs with degenerate normals");
    }
    contacts
}

/// How the earliest impact between two swept triangles happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImpactKind {
    /// Already touching at the start of the interval.
    Overlap,
    EdgeEdge,
    /// A vertex of the first triangle hit the second triangle.
    VertexOfFirst,
    /// A vertex of the second triangle hit the first triangle.
    VertexOfSecond,
}

/// Earliest impact between two swept triangles. Coordinates are `(alpha, beta)` in
/// `V0 + alpha (V1 - V0) + beta (V2 - V0)` on each triangle.
#[derive(Debug, Clone, Copy)]
struct TriangleImpact {
    time: f64,
    first: (f64, f64),
    second: (f64, f64),
    kind: ImpactKind,
}

/// `(alpha, beta)` of the point at parameter `f` along edge `edge` (`v0v1`, `v1v2`, `v2v0`).
fn edge_coordinates(edge: usize, f: f64) -> (f64, f64) {
    match edge {
        0 => (f, 0.0),
        1 => (1.0 - f, f),
        _ => (0.0, 1.0 - f),
    }
}

const VERTEX_COORDINATES: [(f64, f64); 3] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];

fn at_start(t: &[Sweep; 3]) -> [DVec3; 3] {
    [t[0].0, t[1].0, t[2].0]
}

fn at_end(t: &[Sweep; 3]) -> [DVec3; 3] {
    [t[0].1, t[1].1, t[2].1]
}

fn point_at(t: &[DVec3; 3], (alpha, beta): (f64, f64)) -> DVec3 {
    t[0] + (t[1] - t[0]) * alpha + (t[2] - t[0]) * beta
}

fn alpha_beta(p: DVec3, t: &[DVec3; 3]) -> Option<(f64, f64)> {
    barycentric_coordinates(p, t[0], t[1], t[2]).map(|w| (w.y, w.z))
}

/// Earliest contact between two linearly moving triangles.
///
/// Candidates are evaluated in a fixed order: overlap at the start, the nine edge pairs
/// (edges of the first triangle outer, `v0v1`, `v1v2`, `v2v0`), the vertices of the first
/// triangle against the second, then the vertices of the second against the first. Only a
/// strictly earlier time replaces the current best, so ties keep the lowest index.
fn earliest_impact(t1: &[Sweep; 3], t2: &[Sweep; 3]) -> Option<TriangleImpact> {
    let (start1, start2) = (at_start(t1), at_start(t2));
    let overlap = distance_triangle_triangle(&start1, &start2);
    if overlap.distance <= DISTANCE_EPSILON {
        if let (Some(first), Some(second)) = (
            alpha_beta(overlap.point_a, &start1),
            alpha_beta(overlap.point_b, &start2),
        )
        {
            return Some(TriangleImpact {
                time: 0.0,
                first,
                second,
                kind: ImpactKind::Overlap,
            });
        }
    }

    let mut best: Option<TriangleImpact> = None;
    let mut consider = |candidate: TriangleImpact| {
        if best.map_or(true, |b| candidate.time < b.time) {
            best = Some(candidate);
        }
    };

    for e1 in 0..3 {
        for e2 in 0..3 {
            let hit = ccd_segment_segment(&t1[e1], &t1[(e1 + 1) % 3], &t2[e2], &t2[(e2 + 1) % 3]);
            if let Some(hit) = hit {
                consider(TriangleImpact {
                    time: hit.time,
                    first: edge_coordinates(e1, hit.s),
                    second: edge_coordinates(e2, hit.t),
                    kind: ImpactKind::EdgeEdge,
                });
            }
        }
    }

    for (v, &coordinates) in VERTEX_COORDINATES.iter().enumerate() {
        if let Some(hit) = ccd_point_triangle(&t1[v], &t2[0], &t2[1], &t2[2]) {
            consider(TriangleImpact {
                time: hit.time,
                first: coordinates,
                second: (hit.alpha, hit.beta),
                kind: ImpactKind::VertexOfFirst,
            });
        }
    }
    for (v, &coordinates) in VERTEX_COORDINATES.iter().enumerate() {
        if let Some(hit) = ccd_point_triangle(&t2[v], &t1[0], &t1[1], &t1[2]) {
            consider(TriangleImpact {
                time: hit.time,
                first: (hit.alpha, hit.beta),
                second: coordinates,
                kind: ImpactKind::VertexOfSecond,
            });
        }
    }

    best
}

fn end_normal(t: &[Sweep; 3]) -> DVec3 {
    let n = triangle_normal(t[0].1, t[1].1, t[2].1);
    if n == DVec3::ZERO {
        triangle_normal(t[0].0, t[1].0, t[2].0)
    } else {
        n
    }
}

fn swept_tree(start: &MeshShape, end: &MeshShape) -> AabbTree {
    let boxes = (0..start.triangle_count())
        .map(|i| Aabb::swept_triangle(&start.triangle(i), &end.triangle(i)))
        .collect();
    AabbTree::new(boxes)
}

/// Continuous contacts between two meshes moving across the interval, one per colliding
/// triangle pair.
///
/// The penetration points are evaluated at the end of the interval, where the solver needs
/// them, and expressed in each mesh's end pose.
pub fn mesh_mesh_ccd(a: &MeshSweep, b: &MeshSweep) -> Vec<Contact> {
    debug_assert_eq!(
        a.start.triangles(),
        a.end.triangles(),
        "mesh topology changed across the interval"
    );
    debug_assert_eq!(
        b.start.triangles(),
        b.end.triangles(),
        "mesh topology changed across the interval"
    );
    if a.start.vertices().len() != a.end.vertices().len()
        || b.start.vertices().len() != b.end.vertices().len()
    {
        warn!("vertex count changed across the interval, skipping continuous detection");
        return Vec::new();
    }

    let to_a = a.end_pose.inverse();
    let to_b = b.end_pose.inverse();
    let sweep = |mesh: &MeshSweep, index: usize| -> [Sweep; 3] {
        let (s, e) = (mesh.start.triangle(index), mesh.end.triangle(index));
        [(s[0], e[0]), (s[1], e[1]), (s[2], e[2])]
    };

    let candidates = swept_tree(a.start, a.end).spatial_join(&swept_tree(b.start, b.end));
    trace!(candidates = candidates.len(), "mesh-mesh ccd");

    let mut contacts = Vec::new();
    let mut degenerate = 0;
    for (i, j) in candidates {
        let (t1, t2) = (sweep(a, i), sweep(b, j));
        let (n1, n2) = (end_normal(&t1), end_normal(&t2));
        if n1 == DVec3::ZERO || n2 == DVec3::ZERO {
            degenerate += 1;
            continue;
        }
        let Some(impact) = earliest_impact(&t1, &t2) else {
            continue;
        };

        let p1 = point_at(&at_end(&t1), impact.first);
        let p2 = point_at(&at_end(&t2), impact.second);
        let mut normal = match impact.kind {
            ImpactKind::EdgeEdge => (p1 - p2).try_normalize().unwrap_or(-n1),
            ImpactKind::VertexOfFirst => n2,
            ImpactKind::Overlap | ImpactKind::VertexOfSecond => -n1,
        };
        let mut depth = (p2 - p1).dot(normal);
        if depth < 0.0 {
            normal = -normal;
            depth = -depth;
        }

        let weights = |(alpha, beta): (f64, f64)| DVec3::new(1.0 - alpha - beta, alpha, beta);
        contacts.push(Contact::continuous(
            impact.time.clamp(0.0, 1.0),
            depth,
            (p1 + p2) * 0.5,
            normal,
            (
                Location::on_triangle(i, weights(impact.first))
                    .with_rigid_local_position(to_a.transform_point3(p1)),
                Location::on_triangle(j, weights(impact.second))
                    .with_rigid_local_position(to_b.transform_point3(p2)),
            ),
        ));
    }

    if degenerate > 0 {
        warn!(degenerate, "skipped swept triangle pairs with degenerate normals");
    }
    contacts
}

/// Mesh against mesh.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshMeshContact;

impl ContactCalculator for MeshMeshContact {
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
        (ShapeKind::Mesh, ShapeKind::Mesh)
    }

    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        let (Some(mesh_a), Some(mesh_b)) = (world_mesh(a), world_mesh(b)) else {
            return Vec::new();
        };
        mesh_mesh_dcd(&mesh_a, &a.pose, &mesh_b, &b.pose)
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
        let (Some(start_a), Some(end_a), Some(start_b), Some(end_b)) =
            (world_mesh(&a.start), world_mesh(&a.end), world_mesh(&b.start), world_mesh(&b.end))
        else {
            return Vec::new();
        };
        mesh_mesh_ccd(
            &MeshSweep {
                start: &start_a,
                end: &end_a,
                end_pose: a.end.pose,
            },
            &MeshSweep {
                start: &start_b,
                end: &end_b,
                end_pose: b.end.pose,
            },
        )
    }
}
