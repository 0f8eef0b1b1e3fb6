//! Sparse octree shape: the union of its active leaf boxes.

use glam::DVec3;

use super::aabb_tree::AabbTree;
use crate::math::Aabb;

/// One node of an octree. Children are created on demand by [`OctreeNode::add_data`].
#[derive(Debug, Clone)]
pub struct OctreeNode {
    bounds: Aabb,
    active: bool,
    children: Option<Box<[OctreeNode; 8]>>,
}

impl OctreeNode {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            active: false,
            children: None,
        }
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> Option<&[OctreeNode; 8]> {
        self.children.as_deref()
    }

    /// Split into eight octants; child `i` takes the upper half along x, y, z for bits 0, 1, 2.
    pub fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }
        let center = self.bounds.center();
        let corners = self.bounds.corners();
        let children: [OctreeNode; 8] = std::array::from_fn(|i| {
            OctreeNode::new(Aabb::new(corners[i].min(center), corners[i].max(center)))
        });
        self.children = Some(Box::new(children));
    }

    /// Mark the cell containing `position` active, subdividing `levels - 1` times below this node.
    ///
    /// Returns `false` when the position lies outside this node.
    pub fn add_data(&mut self, position: DVec3, levels: usize) -> bool {
        if levels == 0 || !self.bounds.overlaps(&Aabb::new(position, position)) {
            return false;
        }
        if levels == 1 {
            self.active = true;
            return true;
        }
        self.subdivide();
        let added = self
            .children
            .as_mut()
            .is_some_and(|children| {
                children
                    .iter_mut()
                    .any(|child| child.add_data(position, levels - 1))
            });
        self.active |= added;
        added
    }

    /// Number of levels below and including this node, following active children only.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|children| children.iter())
            .filter(|child| child.active)
            .map(OctreeNode::depth)
            .max()
            .unwrap_or(0)
    }

    fn collect_active_leaves(&self, leaves: &mut Vec<Aabb>) {
        if !self.active {
            return;
        }
        match &self.children {
            Some(children) if children.iter().any(|c| c.active) => {
                for child in children.iter() {
                    child.collect_active_leaves(leaves);
                }
            }
            _ => leaves.push(self.bounds),
        }
    }
}

/// Octree shape. Collision uses the boxes of the active leaves, indexed in depth-first order.
#[derive(Debug, Clone)]
pub struct OctreeShape {
    root: OctreeNode,
    leaves: Vec<Aabb>,
    tree: AabbTree,
}

impl OctreeShape {
    pub fn new(root: OctreeNode) -> Self {
        let mut leaves = Vec::new();
        root.collect_active_leaves(&mut leaves);
        let tree = AabbTree::new(leaves.clone());
        Self { root, leaves, tree }
    }

    /// Octree over `bounds` with a leaf activated for every point, `levels` deep.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(
        bounds: Aabb,
        levels: usize,
        points: I,
    ) -> Self {
        let mut root = OctreeNode::new(bounds);
        for p in points {
            root.add_data(p, levels);
        }
        Self::new(root)
    }

    #[inline]
    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    /// Active leaf boxes in the octree frame.
    #[inline]
    pub fn leaves(&self) -> &[Aabb] {
        &self.leaves
    }

    #[inline]
    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    /// Indices of active leaves overlapping `query`, given in the octree frame.
    pub fn leaves_overlapping(&self, query: &Aabb) -> Vec<usize> {
        self.tree.intersections(query)
    }

    pub fn aabb(&self) -> Aabb {
        self.tree.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdivide_octants() {
        let mut node = OctreeNode::new(Aabb::new(DVec3::ZERO, DVec3::splat(16.0)));
        node.subdivide();
        let children = node.children().unwrap();
        assert_eq!(children[0].bounds().max, DVec3::splat(8.0));
        assert_eq!(children[7].bounds().min, DVec3::splat(8.0));
        assert_eq!(children[1].bounds().min, DVec3::new(8.0, 0.0, 0.0));
        assert!(children.iter().all(|c| !c.is_active() && !c.has_children()));
    }

    #[test]
    fn test_add_data_levels() {
        let mut root = OctreeNode::new(Aabb::new(DVec3::splat(-8.0), DVec3::splat(8.0)));
        assert!(root.add_data(DVec3::new(1.0, 1.0, 1.0), 5));
        assert!(root.add_data(DVec3::new(-4.0, 5.0, -7.0), 5));
        assert!(root.is_active());
        assert_eq!(root.depth(), 5);
        let active = root.children().unwrap().iter().filter(|c| c.is_active()).count();
        assert_eq!(active, 2);

        assert!(!root.add_data(DVec3::splat(20.0), 5));
    }

    #[test]
    fn test_single_level_marks_root() {
        let mut root = OctreeNode::new(Aabb::new(DVec3::splat(-8.0), DVec3::splat(8.0)));
        assert!(root.add_data(DVec3::ONE, 1));
        assert!(root.is_active());
        assert!(!root.has_children());
    }

    #[test]
    fn test_shape_leaves() {
        let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(4.0));
        let shape = OctreeShape::from_points(bounds, 3, [DVec3::splat(0.5), DVec3::splat(3.5)]);
        assert_eq!(shape.leaves().len(), 2);
        let eps = 1e-12;
        assert!((shape.leaves()[0].extents() - DVec3::ONE).length() < eps);
        let hits = shape.leaves_overlapping(&Aabb::new(DVec3::splat(3.2), DVec3::splat(3.3)));
        assert_eq!(hits, vec![1]);
    }
}
