//! Bounding volume tree over the elements (triangles, segments, boxes) of one shape.
//!
//! The tree stores one [`Aabb`] per element and answers two queries: which elements overlap a
//! box, and which element pairs of two trees overlap each other (the spatial join used by the
//! mesh calculators to find candidate triangle pairs).

use crate::math::Aabb;

/// A node of the tree.
#[derive(Debug, Clone)]
pub enum AabbTreeNode {
    /// Leaf holding a few element indices.
    Leaf {
        /// Bounds of all elements in this leaf.
        bbox: Aabb,
        /// Element indices stored in this leaf.
        items: Vec<usize>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounds of the whole subtree.
        bbox: Aabb,
        left: Box<Self>,
        right: Box<Self>,
    },
}

impl AabbTreeNode {
    #[inline]
    pub fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding volume tree built by median split along the longest axis.
#[derive(Debug, Clone, Default)]
pub struct AabbTree {
    root: Option<AabbTreeNode>,
    item_boxes: Vec<Aabb>,
}

impl AabbTree {
    /// Maximum number of elements per leaf used by [`AabbTree::new`].
    pub const DEFAULT_LEAF_SIZE: usize = 4;

    /// Build a tree over `item_boxes`; element `i` is identified by its index.
    pub fn new(item_boxes: Vec<Aabb>) -> Self {
        Self::with_leaf_size(item_boxes, Self::DEFAULT_LEAF_SIZE)
    }

    pub fn with_leaf_size(item_boxes: Vec<Aabb>, max_leaf_size: usize) -> Self {
        if item_boxes.is_empty() {
            return Self::default();
        }
        let indices: Vec<usize> = (0..item_boxes.len()).collect();
        let root = Self::build_recursive(&item_boxes, indices, max_leaf_size.max(1));
        Self {
            root: Some(root),
            item_boxes,
        }
    }

    fn build_recursive(
        boxes: &[Aabb],
        mut indices: Vec<usize>,
        max_leaf_size: usize,
    ) -> AabbTreeNode {
        let bbox = indices
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.merge(&boxes[i]));

        if indices.len() <= max_leaf_size {
            return AabbTreeNode::Leaf { bbox, items: indices };
        }

        let axis = bbox.longest_axis();
        indices.sort_by(|&a, &b| {
            boxes[a].center()[axis]
                .total_cmp(&boxes[b].center()[axis])
                .then(a.cmp(&b))
        });
        let right_indices = indices.split_off(indices.len() / 2);

        AabbTreeNode::Internal {
            bbox,
            left: Box::new(Self::build_recursive(boxes, indices, max_leaf_size)),
            right: Box::new(Self::build_recursive(boxes, right_indices, max_leaf_size)),
        }
    }

    /// Number of elements in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.item_boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.item_boxes.is_empty()
    }

    /// Bounds of every element, empty for an empty tree.
    pub fn bounds(&self) -> Aabb {
        self.root.as_ref().map_or(Aabb::EMPTY, |root| *root.bbox())
    }

    /// Bounds of element `index`.
    #[inline]
    pub fn item_box(&self, index: usize) -> &Aabb {
        &self.item_boxes[index]
    }

    pub fn root(&self) -> Option<&AabbTreeNode> {
        self.root.as_ref()
    }

    /// Sorted indices of the elements whose bounds overlap `query`.
    pub fn intersections(&self, query: &Aabb) -> Vec<usize> {
        let mut result = Vec::new();
        if let Some(root) = &self.root {
            self.query_recursive(root, query, &mut result);
        }
        result.sort_unstable();
        result
    }

    fn query_recursive(&self, node: &AabbTreeNode, query: &Aabb, result: &mut Vec<usize>) {
        if !node.bbox().overlaps(query) {
            return;
        }
        match node {
            AabbTreeNode::Leaf { items, .. } => {
                result.extend(
                    items.iter().copied().filter(|&i| self.item_boxes[i].overlaps(query)),
                );
            }
            AabbTreeNode::Internal { left, right, .. } => {
                self.query_recursive(left, query, result);
                self.query_recursive(right, query, result);
            }
        }
    }

    /// Every `(self element, other element)` pair whose bounds overlap, sorted.
    pub fn spatial_join(&self, other: &AabbTree) -> Vec<(usize, usize)> {
        let mut result = Vec::new();
        if let (Some(a), Some(b)) = (&self.root, &other.root) {
            Self::join_recursive(self, a, other, b, &mut result);
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    fn join_recursive(
        tree_a: &AabbTree,
        a: &AabbTreeNode,
        tree_b: &AabbTree,
        b: &AabbTreeNode,
        result: &mut Vec<(usize, usize)>,
    ) {
        if !a.bbox().overlaps(b.bbox()) {
            return;
        }
        match (a, b) {
            (
                AabbTreeNode::Leaf { items: items_a, .. },
                AabbTreeNode::Leaf { items: items_b, .. },
            ) => {
                for &i in items_a {
                    let box_a = &tree_a.item_boxes[i];
                    for &j in items_b {
                        if box_a.overlaps(&tree_b.item_boxes[j]) {
                            result.push((i, j));
                        }
                    }
                }
            }
            (AabbTreeNode::Internal { left, right, .. }, AabbTreeNode::Leaf { .. }) => {
                Self::join_recursive(tree_a, left, tree_b, b, result);
                Self::join_recursive(tree_a, right, tree_b, b, result);
            }
            (AabbTreeNode::Leaf { .. }, AabbTreeNode::Internal { left, right, .. }) => {
                Self::join_recursive(tree_a, a, tree_b, left, result);
                Self::join_recursive(tree_a, a, tree_b, right, result);
            }
            (
                AabbTreeNode::Internal {
                    bbox: bbox_a,
                    left: left_a,
                    right: right_a,
                },
                AabbTreeNode::Internal {
                    bbox: bbox_b,
                    left: left_b,
                    right: right_b,
                },
            ) => {
                // Descend the larger node first
                if bbox_a.extents().length_squared() >= bbox_b.extents().length_squared() {
                    Self::join_recursive(tree_a, left_a, tree_b, b, result);
                    Self::join_recursive(tree_a, right_a, tree_b, b, result);
                } else {
                    Self::join_recursive(tree_a, a, tree_b, left_b, result);
                    Self::join_recursive(tree_a, a, tree_b, right_b, result);
                }
            }
        }
    }
}
