//! Shape-local descriptions of a point on a representation.
//!
//! Bodies move between detection and resolution, so contacts never store a bare world position
//! for their penetration points. A [`Location`] keeps enough shape-local information to
//! recompute the world position from whatever state the representation is in later.

use glam::DVec3;

use crate::math::geometry::from_barycentric;

/// A point inside an element (triangle or segment) given by its barycentric weights.
///
/// Triangles use weights `(w0, w1, w2)`; segments use `(1 - t, t, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedLocalCoordinate {
    pub index: usize,
    pub coordinate: DVec3,
}

impl IndexedLocalCoordinate {
    pub fn new(index: usize, coordinate: DVec3) -> Self {
        Self { index, coordinate }
    }

    /// Point at parameter `t` along segment `index`.
    pub fn on_segment(index: usize, t: f64) -> Self {
        Self {
            index,
            coordinate: DVec3::new(1.0 - t, t, 0.0),
        }
    }

    /// World point from the element's vertex positions.
    pub fn resolve_triangle(&self, vertices: &[DVec3; 3]) -> DVec3 {
        from_barycentric(self.coordinate, vertices[0], vertices[1], vertices[2])
    }

    pub fn resolve_segment(&self, vertices: &[DVec3; 2]) -> DVec3 {
        vertices[0] * self.coordinate.x + vertices[1] * self.coordinate.y
    }

    /// Whether the weights sum to one within `epsilon`.
    pub fn is_normalized(&self, epsilon: f64) -> bool {
        (self.coordinate.x + self.coordinate.y + self.coordinate.z - 1.0).abs() <= epsilon
    }
}

/// Where a contact touches one of the two shapes.
///
/// Every field is optional; a calculator fills in whatever its shape can provide and the
/// representation picks the one it understands.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    /// Position in the shape's local frame, for rigid representations.
    pub rigid_local_position: Option<DVec3>,
    /// Triangle of a mesh shape.
    pub triangle: Option<IndexedLocalCoordinate>,
    /// Segment of a segment mesh shape.
    pub segment: Option<IndexedLocalCoordinate>,
    /// Node (vertex or octree leaf) index.
    pub node: Option<usize>,
}

impl Location {
    pub fn from_rigid(local_position: DVec3) -> Self {
        Self {
            rigid_local_position: Some(local_position),
            ..Self::default()
        }
    }

    pub fn on_triangle(index: usize, weights: DVec3) -> Self {
        Self {
            triangle: Some(IndexedLocalCoordinate::new(index, weights)),
            ..Self::default()
        }
    }

    pub fn on_segment(index: usize, t: f64) -> Self {
        Self {
            segment: Some(IndexedLocalCoordinate::on_segment(index, t)),
            ..Self::default()
        }
    }

    pub fn with_rigid_local_position(mut self, local_position: DVec3) -> Self {
        self.rigid_local_position = Some(local_position);
        self
    }

    pub fn with_node(mut self, node: usize) -> Self {
        self.node = Some(node);
        self
    }
}
