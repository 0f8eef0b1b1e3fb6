//! Triangle-triangle penetration by prism clipping.
//!
//! Each triangle is clipped against the three side planes of the other triangle's prism, and
//! the clipped polygon's deepest vertex under the other triangle's plane gives a candidate
//! penetration. The shallower of the two candidates is reported.

use glam::DVec3;

use super::geometry::triangles_intersect;
use super::{triangle_normal, DISTANCE_EPSILON};

/// Penetration between two triangles.
///
/// Translating triangle A by `normal * depth` brings the triangles to a just-touching state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleContact {
    pub depth: f64,
    pub normal: DVec3,
    /// Penetrating point on triangle A.
    pub point_a: DVec3,
    /// Penetrating point on triangle B.
    pub point_b: DVec3,
}

const CLIP_CAPACITY: usize = 10;

/// Convex polygon on the stack, the output of successive plane clips.
#[derive(Clone, Copy)]
struct ClipPolygon {
    vertices: [DVec3; CLIP_CAPACITY],
    len: usize,
}

impl ClipPolygon {
    fn from_triangle(t: &[DVec3; 3]) -> Self {
        let mut vertices = [DVec3::ZERO; CLIP_CAPACITY];
        vertices[..3].copy_from_slice(t);
        Self { vertices, len: 3 }
    }

    fn as_slice(&self) -> &[DVec3] {
        &self.vertices[..self.len]
    }

    fn push(&mut self, v: DVec3) {
        if self.len < CLIP_CAPACITY {
            self.vertices[self.len] = v;
            self.len += 1;
        }
    }

    /// Keep the part of the polygon on the negative side of `plane_n · x + plane_d = 0`.
    fn clip(&self, plane_n: DVec3, plane_d: f64) -> Self {
        let mut out = Self {
            vertices: [DVec3::ZERO; CLIP_CAPACITY],
            len: 0,
        };
        let verts = self.as_slice();
        for (i, &start) in verts.iter().enumerate() {
            let end = verts[(i + 1) % verts.len()];
            let d_start = start.dot(plane_n) + plane_d;
            let d_end = end.dot(plane_n) + plane_d;

            if d_start <= DISTANCE_EPSILON {
                out.push(start);
            }
            if (d_start < -DISTANCE_EPSILON && d_end > DISTANCE_EPSILON)
                || (d_start > DISTANCE_EPSILON && d_end < -DISTANCE_EPSILON)
            {
                let ratio = d_start / (d_start - d_end);
                out.push(start + (end - start) * ratio);
            }
        }
        out
    }
}

/// A triangle with its unit normal and plane offset.
struct PlanarTriangle<'a> {
    vertices: &'a [DVec3; 3],
    normal: DVec3,
    plane_d: f64,
}

impl<'a> PlanarTriangle<'a> {
    fn new(vertices: &'a [DVec3; 3], normal: DVec3) -> Self {
        Self {
            vertices,
            normal,
            plane_d: -vertices[0].dot(normal),
        }
    }

    /// Outward side plane of the prism through edge `index`.
    fn prism_plane(&self, index: usize) -> (DVec3, f64) {
        let edge = self.vertices[(index + 1) % 3] - self.vertices[index];
        let n = edge.cross(self.normal).normalize_or_zero();
        (n, -self.vertices[index].dot(n))
    }

    /// Deepest point of `self` under `other`'s plane, restricted to `other`'s prism.
    ///
    /// Returns `(depth, point on self, point projected on other)` with a positive depth.
    fn deepest_penetration(&self, other: &PlanarTriangle) -> Option<(f64, DVec3, DVec3)> {
        let mut polygon = ClipPolygon::from_triangle(self.vertices);
        for i in 0..3 {
            let (n, d) = other.prism_plane(i);
            polygon = polygon.clip(n, d);
        }

        let mut signed_depth = 0.0;
        let mut deepest = None;
        for &v in polygon.as_slice() {
            let distance = v.dot(other.normal) + other.plane_d;
            if distance < signed_depth {
                signed_depth = distance;
                deepest = Some(v);
            }
        }
        deepest.map(|p| (-signed_depth, p, p - other.normal * signed_depth))
    }
}

/// Contact between triangles `a` and `b` with precomputed unit normals.
///
/// Returns `None` when the triangles do not intersect or either normal is zero.
pub fn calculate_contact_triangle_triangle(
    a: &[DVec3; 3],
    normal_a: DVec3,
    b: &[DVec3; 3],
    normal_b: DVec3,
) -> Option<TriangleContact> {
    if normal_a == DVec3::ZERO || normal_b == DVec3::ZERO {
        return None;
    }
    if !triangles_intersect(a, b) {
        return None;
    }

    let tri_a = PlanarTriangle::new(a, normal_a);
    let tri_b = PlanarTriangle::new(b, normal_b);

    let a_into_b = tri_a.deepest_penetration(&tri_b);
    let b_into_a = tri_b.deepest_penetration(&tri_a);

    match (a_into_b, b_into_a) {
        (Some((depth_a, on_a, on_b)), Some((depth_b, _, _))) if depth_a < depth_b => {
            Some(TriangleContact {
                depth: depth_a,
                normal: normal_b,
                point_a: on_a,
                point_b: on_b,
            })
        }
        (Some((depth, on_a, on_b)), None) => Some(TriangleContact {
            depth,
            normal: normal_b,
            point_a: on_a,
            point_b: on_b,
        }),
        (_, Some((depth, on_b, on_a))) => Some(TriangleContact {
            depth,
            normal: -normal_a,
            point_a: on_a,
            point_b: on_b,
        }),
        (None, None) => None,
    }
}

/// Contact between triangles `a` and `b`, computing their normals first.
pub fn contact_triangle_triangle(a: &[DVec3; 3], b: &[DVec3; 3]) -> Option<TriangleContact> {
    let na = triangle_normal(a[0], a[1], a[2]);
    let nb = triangle_normal(b[0], b[1], b[2]);
    calculate_contact_triangle_triangle(a, na, b, nb)
}
