//! Axis-aligned bounding boxes.

use glam::{DAffine3, DVec3};

/// Axis-aligned bounding box in double precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An empty box that absorbs any point it is extended with.
    pub const EMPTY: Aabb = Aabb {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point of the iterator.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut aabb, p| {
            aabb.extend_point(p);
            aabb
        })
    }

    /// Bounds of a triangle.
    pub fn from_triangle(triangle: &[DVec3; 3]) -> Self {
        Self::from_points(triangle.iter().copied())
    }

    /// Bounds of a triangle moving linearly from `start` to `end`.
    pub fn swept_triangle(start: &[DVec3; 3], end: &[DVec3; 3]) -> Self {
        Self::from_triangle(start).merge(&Self::from_triangle(end))
    }

    /// Box centered at `center` with the given half extents.
    pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn extend_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow the box by `margin` on every side.
    #[inline]
    pub fn inflate(&self, margin: f64) -> Aabb {
        Aabb {
            min: self.min - DVec3::splat(margin),
            max: self.max + DVec3::splat(margin),
        }
    }

    /// Test whether two boxes overlap. Touching boxes overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extents(&self) -> DVec3 {
        self.max - self.min
    }

    /// Index (0 = x, 1 = y, 2 = z) of the longest side.
    pub fn longest_axis(&self) -> usize {
        let e = self.extents();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// The eight corners, indexed by bits (x = bit 0, y = bit 1, z = bit 2).
    pub fn corners(&self) -> [DVec3; 8] {
        std::array::from_fn(|i| {
            DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// World-space box enclosing this box after applying `pose`.
    pub fn transformed(&self, pose: &DAffine3) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::from_points(self.corners().into_iter().map(|c| pose.transform_point3(c)))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let b = Aabb::new(DVec3::splat(0.5), DVec3::splat(2.0));
        let c = Aabb::new(DVec3::splat(1.5), DVec3::splat(2.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));

        let touching = Aabb::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&touching));
    }

    #[test]
    fn test_aabb_empty_absorbs_points() {
        let mut aabb = Aabb::EMPTY;
        assert!(aabb.is_empty());
        aabb.extend_point(DVec3::new(1.0, -2.0, 3.0));
        assert!(!aabb.is_empty());
        assert_eq!(aabb.min, aabb.max);
    }

    #[test]
    fn test_swept_triangle_covers_both_ends() {
        let start = [DVec3::ZERO, DVec3::X, DVec3::Y];
        let end = start.map(|v| v + DVec3::new(0.0, 0.0, -2.0));
        let swept = Aabb::swept_triangle(&start, &end);
        assert_eq!(swept.min, DVec3::new(0.0, 0.0, -2.0));
        assert_eq!(swept.max, DVec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_aabb_longest_axis() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::new(1.0, 3.0, 2.0));
        assert_eq!(aabb.longest_axis(), 1);
    }

    #[test]
    fn test_aabb_transformed_rotation() {
        let aabb = Aabb::new(DVec3::new(-1.0, -0.5, -0.5), DVec3::new(1.0, 0.5, 0.5));
        let pose = DAffine3::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let rotated = aabb.transformed(&pose);
        let eps = 1e-12;
        assert!((rotated.max - DVec3::new(0.5, 1.0, 0.5)).length() < eps);
        assert!((rotated.min - DVec3::new(-0.5, -1.0, -0.5)).length() < eps);
    }
}
