//! Point, segment and triangle queries.
//!
//! Triangles are passed as `[DVec3; 3]`. Barycentric coordinates are returned as weights
//! `(w0, w1, w2)` with `P = w0 V0 + w1 V1 + w2 V2`, so that `(w1, w2)` are the `(alpha, beta)`
//! of `P = V0 + alpha (V1 - V0) + beta (V2 - V0)`.

use glam::DVec3;

use super::{triangle_normal, DISTANCE_EPSILON};

/// Tolerance on barycentric weights when deciding whether a point lies inside a triangle.
pub const BARYCENTRIC_EPSILON: f64 = 1e-10;

/// Barycentric weights of `p` relative to the triangle `(v0, v1, v2)`.
///
/// `p` is assumed to lie in the plane of the triangle; out-of-plane components are projected
/// away. Returns `None` when the triangle is degenerate.
pub fn barycentric_coordinates(p: DVec3, v0: DVec3, v1: DVec3, v2: DVec3) -> Option<DVec3> {
    let e0 = v1 - v0;
    let e1 = v2 - v0;
    let e2 = p - v0;

    let d00 = e0.dot(e0);
    let d01 = e0.dot(e1);
    let d11 = e1.dot(e1);
    let d20 = e2.dot(e0);
    let d21 = e2.dot(e1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= f64::EPSILON * d00 * d11 || denom == 0.0 {
        return None;
    }

    let alpha = (d11 * d20 - d01 * d21) / denom;
    let beta = (d00 * d21 - d01 * d20) / denom;
    Some(DVec3::new(1.0 - alpha - beta, alpha, beta))
}

/// World point described by barycentric `weights` on the triangle `(v0, v1, v2)`.
#[inline]
pub fn from_barycentric(weights: DVec3, v0: DVec3, v1: DVec3, v2: DVec3) -> DVec3 {
    v0 * weights.x + v1 * weights.y + v2 * weights.z
}

/// Whether barycentric weights describe a point inside the triangle (boundary included).
#[inline]
pub fn weights_inside(weights: DVec3, epsilon: f64) -> bool {
    weights.x >= -epsilon && weights.y >= -epsilon && weights.z >= -epsilon
}

/// Whether `p`, assumed coplanar with the triangle, lies inside it.
pub fn is_point_inside_triangle(p: DVec3, v0: DVec3, v1: DVec3, v2: DVec3) -> bool {
    barycentric_coordinates(p, v0, v1, v2)
        .map(|w| weights_inside(w, BARYCENTRIC_EPSILON))
        .unwrap_or(false)
}

/// Closest point on segment `[a, b]` to `p`, with its parameter along the segment.
pub fn closest_point_on_segment(p: DVec3, a: DVec3, b: DVec3) -> (DVec3, f64) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= DISTANCE_EPSILON * DISTANCE_EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Closest points between two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentClosestPoints {
    /// Parameter along the first segment.
    pub s: f64,
    /// Parameter along the second segment.
    pub t: f64,
    pub point_a: DVec3,
    pub point_b: DVec3,
    pub distance: f64,
}

/// Closest points between segments `[p0, p1]` and `[q0, q1]`, parameters clamped to [0, 1].
pub fn closest_points_segment_segment(
    p0: DVec3,
    p1: DVec3,
    q0: DVec3,
    q1: DVec3,
) -> SegmentClosestPoints {
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let f = d2.dot(r);
    let eps = DISTANCE_EPSILON * DISTANCE_EPSILON;

    let (s, t) = if a <= eps && e <= eps {
        (0.0, 0.0)
    } else if a <= eps {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= eps {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            // Parallel segments: any s works, start from the first endpoint
            let mut s = if denom > eps * a * e {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let point_a = p0 + d1 * s;
    let point_b = q0 + d2 * t;
    SegmentClosestPoints {
        s,
        t,
        point_a,
        point_b,
        distance: point_a.distance(point_b),
    }
}

/// Closest point on the triangle `(a, b, c)` to `p` (Voronoi region walk).
pub fn closest_point_on_triangle(p: DVec3, a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Intersection point of segment `[p0, p1]` with the triangle, if any.
///
/// Coplanar segments report the closest point on the segment to any touching edge.
pub fn segment_triangle_intersection(p0: DVec3, p1: DVec3, tri: &[DVec3; 3]) -> Option<DVec3> {
    let n = triangle_normal(tri[0], tri[1], tri[2]);
    if n == DVec3::ZERO {
        return None;
    }
    let d0 = n.dot(p0 - tri[0]);
    let d1 = n.dot(p1 - tri[0]);

    if (d0 > DISTANCE_EPSILON && d1 > DISTANCE_EPSILON)
        || (d0 < -DISTANCE_EPSILON && d1 < -DISTANCE_EPSILON)
    {
        return None;
    }

    if d0.abs() <= DISTANCE_EPSILON && d1.abs() <= DISTANCE_EPSILON {
        if is_point_inside_triangle(p0, tri[0], tri[1], tri[2]) {
            return Some(p0);
        }
        if is_point_inside_triangle(p1, tri[0], tri[1], tri[2]) {
            return Some(p1);
        }
        return (0..3)
            .map(|i| closest_points_segment_segment(p0, p1, tri[i], tri[(i + 1) % 3]))
            .find(|c| c.distance <= DISTANCE_EPSILON)
            .map(|c| c.point_a);
    }

    let x = if (d0 - d1).abs() <= f64::EPSILON {
        p0
    } else {
        p0 + (p1 - p0) * (d0 / (d0 - d1))
    };
    is_point_inside_triangle(x, tri[0], tri[1], tri[2]).then_some(x)
}

/// Whether two triangles touch or interpenetrate.
pub fn triangles_intersect(a: &[DVec3; 3], b: &[DVec3; 3]) -> bool {
    first_triangle_intersection(a, b).is_some()
}

fn first_triangle_intersection(a: &[DVec3; 3], b: &[DVec3; 3]) -> Option<DVec3> {
    (0..3)
        .find_map(|i| segment_triangle_intersection(a[i], a[(i + 1) % 3], b))
        .or_else(|| (0..3).find_map(|i| segment_triangle_intersection(b[i], b[(i + 1) % 3], a)))
}

/// Distance between two triangles and the closest point on each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleDistance {
    pub distance: f64,
    pub point_a: DVec3,
    pub point_b: DVec3,
}

/// Distance between two triangles. Intersecting triangles have distance zero and share a
/// point on their intersection.
pub fn distance_triangle_triangle(a: &[DVec3; 3], b: &[DVec3; 3]) -> TriangleDistance {
    if let Some(x) = first_triangle_intersection(a, b) {
        return TriangleDistance {
            distance: 0.0,
            point_a: x,
            point_b: x,
        };
    }

    let mut best = TriangleDistance {
        distance: f64::INFINITY,
        point_a: a[0],
        point_b: b[0],
    };
    let mut consider = |point_a: DVec3, point_b: DVec3| {
        let distance = point_a.distance(point_b);
        if distance < best.distance {
            best = TriangleDistance {
                distance,
                point_a,
                point_b,
            };
        }
    };

    for i in 0..3 {
        for j in 0..3 {
            let c = closest_points_segment_segment(a[i], a[(i + 1) % 3], b[j], b[(j + 1) % 3]);
            consider(c.point_a, c.point_b);
        }
    }
    for &p in a {
        consider(p, closest_point_on_triangle(p, b[0], b[1], b[2]));
    }
    for &p in b {
        consider(closest_point_on_triangle(p, a[0], a[1], a[2]), p);
    }
    best
}
