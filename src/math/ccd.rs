//! Swept (continuous) segment-segment and point-triangle tests.
//!
//! Every primitive moves linearly from its position at `t = 0` to its position at `t = 1`.
//! Contact can only occur when the four involved points are coplanar, so the candidate times
//! are the roots in [0, 1] of the cubic coplanarity condition. Each root is then validated
//! with a static proximity test, earliest first.

use glam::DVec3;

use super::geometry::{barycentric_coordinates, closest_points_segment_segment, weights_inside};
use super::{lerp, DISTANCE_EPSILON};

/// A point moving linearly across the interval, `(position at t = 0, position at t = 1)`.
pub type Sweep = (DVec3, DVec3);

/// Relative tolerance on the coplanarity determinant for accepting a sampled root.
const COPLANARITY_TOLERANCE: f64 = 1e-12;
/// Bisection steps used to isolate a root within a monotonic bracket.
const BISECTION_STEPS: usize = 80;
/// Tolerance on barycentric weights when validating a point-triangle root.
const CCD_BARYCENTRIC_EPSILON: f64 = 1e-9;

/// Result of a swept segment-segment test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSegmentImpact {
    /// Time of impact in [0, 1].
    pub time: f64,
    /// Parameter along the first segment.
    pub s: f64,
    /// Parameter along the second segment.
    pub t: f64,
}

/// Result of a swept point-triangle test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointTriangleImpact {
    /// Time of impact in [0, 1].
    pub time: f64,
    /// `alpha` in `P = V0 + alpha (V1 - V0) + beta (V2 - V0)`.
    pub alpha: f64,
    /// `beta` in `P = V0 + alpha (V1 - V0) + beta (V2 - V0)`.
    pub beta: f64,
}

#[inline]
fn at(sweep: &Sweep, t: f64) -> DVec3 {
    lerp(sweep.0, sweep.1, t)
}

/// Cubic `c[0] + c[1] t + c[2] t^2 + c[3] t^3` of `u(t) · (v(t) x w(t))` for linear `u, v, w`.
fn triple_product_coefficients(
    u: (DVec3, DVec3),
    v: (DVec3, DVec3),
    w: (DVec3, DVec3),
) -> [f64; 4] {
    let (u0, du) = u;
    let (v0, dv) = v;
    let (w0, dw) = w;
    [
        u0.dot(v0.cross(w0)),
        du.dot(v0.cross(w0)) + u0.dot(dv.cross(w0)) + u0.dot(v0.cross(dw)),
        u0.dot(dv.cross(dw)) + du.dot(v0.cross(dw)) + du.dot(dv.cross(w0)),
        du.dot(dv.cross(dw)),
    ]
}

/// Start value and rate of change of `b(t) - a(t)`.
#[inline]
fn relative(a: &Sweep, b: &Sweep) -> (DVec3, DVec3) {
    let start = b.0 - a.0;
    (start, (b.1 - a.1) - start)
}

#[inline]
fn magnitude(v: (DVec3, DVec3)) -> f64 {
    v.0.length() + v.1.length()
}

/// Roots of `f` in [0, 1], ascending.
///
/// `coefficients` describe the same cubic as `f`; they are only used to split [0, 1] into
/// monotonic pieces. `f` itself is evaluated for sign tests so that the interval ends are
/// exact. Values with `|f| <= tolerance` count as roots.
fn unit_interval_roots(coefficients: [f64; 4], tolerance: f64, f: impl Fn(f64) -> f64) -> Vec<f64> {
    let mut breaks = vec![0.0];
    breaks.extend(
        derivative_roots(&coefficients)
            .into_iter()
            .filter(|&t| t > 0.0 && t < 1.0),
    );
    breaks.push(1.0);
    breaks.sort_by(f64::total_cmp);

    let mut roots: Vec<f64> = Vec::new();
    for window in breaks.windows(2) {
        let (lo, hi) = (window[0], window[1]);
        let f_lo = f(lo);
        let f_hi = f(hi);
        if f_lo.abs() <= tolerance {
            push_root(&mut roots, lo);
        }
        if f_lo.abs() > tolerance && f_hi.abs() > tolerance && f_lo.signum() != f_hi.signum() {
            push_root(&mut roots, bisect(&f, lo, hi, f_lo));
        }
    }
    if f(1.0).abs() <= tolerance {
        push_root(&mut roots, 1.0);
    }
    roots
}

fn push_root(roots: &mut Vec<f64>, t: f64) {
    if roots.last().map_or(true, |&last| t > last) {
        roots.push(t);
    }
}

fn bisect(f: &impl Fn(f64) -> f64, mut lo: f64, mut hi: f64, mut f_lo: f64) -> f64 {
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Real roots of the derivative of the cubic.
fn derivative_roots(c: &[f64; 4]) -> Vec<f64> {
    let a = 3.0 * c[3];
    let b = 2.0 * c[2];
    let k = c[1];
    let scale = a.abs().max(b.abs()).max(k.abs());
    if scale == 0.0 {
        return Vec::new();
    }
    if a.abs() <= f64::EPSILON * scale {
        if b.abs() <= f64::EPSILON * scale {
            return Vec::new();
        }
        return vec![-k / b];
    }
    let discriminant = b * b - 4.0 * a * k;
    if discriminant < 0.0 {
        return Vec::new();
    }
    let sq = discriminant.sqrt();
    // Numerically stable pair of quadratic roots
    let q = -0.5 * (b + b.signum() * sq);
    if q == 0.0 {
        return vec![0.0];
    }
    vec![q / a, k / q]
}

/// Whether every coefficient is negligible relative to `scale`.
fn vanishes(coefficients: &[f64; 4], scale: f64) -> bool {
    coefficients
        .iter()
        .all(|c| c.abs() <= COPLANARITY_TOLERANCE * scale)
}

/// Candidate times for primitives that stay coplanar across the whole interval.
///
/// Contact then starts when a point becomes collinear with one of the other primitive's edges,
/// which is a quadratic condition along the common plane normal.
fn coplanar_candidate_times(
    normal: DVec3,
    point_edge_pairs: &[(&Sweep, &Sweep, &Sweep)],
) -> Vec<f64> {
    let mut times = vec![0.0];
    for &(p, x, y) in point_edge_pairs {
        let px = relative(x, p);
        let xy = relative(x, y);
        let n = (normal, DVec3::ZERO);
        let coefficients = triple_product_coefficients(n, px, xy);
        let scale = magnitude(px) * magnitude(xy);
        if scale == 0.0 || vanishes(&coefficients, scale) {
            continue;
        }
        let tolerance = COPLANARITY_TOLERANCE * scale;
        times.extend(unit_interval_roots(coefficients, tolerance, |t| {
            normal.dot((at(p, t) - at(x, t)).cross(at(y, t) - at(x, t)))
        }));
    }
    times.push(1.0);
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// Earliest time in [0, 1] at which the swept segments `a b` and `c d` touch.
///
/// The returned parameters locate the contact as `a + s (b - a)` and `c + t (d - c)`.
pub fn ccd_segment_segment(
    a: &Sweep,
    b: &Sweep,
    c: &Sweep,
    d: &Sweep,
) -> Option<SegmentSegmentImpact> {
    let ab = relative(a, b);
    let ac = relative(a, c);
    let ad = relative(a, d);
    let coefficients = triple_product_coefficients(ab, ac, ad);
    let scale = magnitude(ab) * magnitude(ac) * magnitude(ad);

    let check = |time: f64| {
        let closest = closest_points_segment_segment(
            at(a, time),
            at(b, time),
            at(c, time),
            at(d, time),
        );
        (closest.distance < DISTANCE_EPSILON).then_some(SegmentSegmentImpact {
            time,
            s: closest.s,
            t: closest.t,
        })
    };

    if scale == 0.0 || vanishes(&coefficients, scale) {
        let normal = coplanar_normal(&[ab.0, ac.0, ad.0, ab.0 + ab.1, ac.0 + ac.1, ad.0 + ad.1]);
        if normal == DVec3::ZERO {
            return check(0.0);
        }
        let times = coplanar_candidate_times(normal, &[(a, c, d), (b, c, d), (c, a, b), (d, a, b)]);
        return times.into_iter().find_map(check);
    }

    let tolerance = COPLANARITY_TOLERANCE * scale;
    unit_interval_roots(coefficients, tolerance, |t| {
        let pa = at(a, t);
        (at(b, t) - pa).dot((at(c, t) - pa).cross(at(d, t) - pa))
    })
    .into_iter()
    .find_map(check)
}

/// Earliest time in [0, 1] at which the swept point `p` touches the swept triangle `a b c`.
pub fn ccd_point_triangle(
    p: &Sweep,
    a: &Sweep,
    b: &Sweep,
    c: &Sweep,
) -> Option<PointTriangleImpact> {
    let ap = relative(a, p);
    let ab = relative(a, b);
    let ac = relative(a, c);
    let coefficients = triple_product_coefficients(ap, ab, ac);
    let scale = magnitude(ap) * magnitude(ab) * magnitude(ac);

    let check = |time: f64| {
        let weights = barycentric_coordinates(at(p, time), at(a, time), at(b, time), at(c, time))?;
        weights_inside(weights, CCD_BARYCENTRIC_EPSILON).then_some(PointTriangleImpact {
            time,
            alpha: weights.y,
            beta: weights.z,
        })
    };

    if scale == 0.0 || vanishes(&coefficients, scale) {
        let normal = coplanar_normal(&[ab.0, ac.0, ab.0 + ab.1, ac.0 + ac.1]);
        if normal == DVec3::ZERO {
            return None;
        }
        let times = coplanar_candidate_times(normal, &[(p, a, b), (p, b, c), (p, c, a)]);
        return times.into_iter().find_map(check);
    }

    let tolerance = COPLANARITY_TOLERANCE * scale;
    unit_interval_roots(coefficients, tolerance, |t| {
        let pa = at(a, t);
        (at(p, t) - pa).dot((at(b, t) - pa).cross(at(c, t) - pa))
    })
    .into_iter()
    .find_map(check)
}

/// Normal of the plane spanned by the largest cross product among `directions`.
fn coplanar_normal(directions: &[DVec3]) -> DVec3 {
    let mut best = DVec3::ZERO;
    for (i, u) in directions.iter().enumerate() {
        for v in &directions[i + 1..] {
            let n = u.cross(*v);
            if n.length_squared() > best.length_squared() {
                best = n;
            }
        }
    }
    best.normalize_or_zero()
}
