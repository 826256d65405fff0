// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tree nodes and the node-local insertion/removal rules.

use core::mem;

use p3d_geom::Bounds;

/// Payload of a [`TreeNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<T> {
    /// Wraps exactly one external object handle.
    Leaf(T),
    /// Owns its children (at most the tree's branching factor).
    Internal(Vec<TreeNode<T>>),
}

/// A node of a [`crate::bounds_tree::BoundsTree`].
///
/// `bounds` always equals the union of the subtree's leaf bounds. A node
/// flagged as group head is the single entry point of an atomic group: its
/// contents may be reorganised, but the group is never split and nothing from
/// outside is inserted into it except through the group-aware operations.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<T> {
    pub(crate) bounds: Bounds,
    pub(crate) is_group_head: bool,
    pub(crate) kind: NodeKind<T>,
}

impl<T: Copy + Eq> TreeNode<T> {
    /// Builds a leaf.
    pub fn leaf(object: T, bounds: Bounds, is_group_head: bool) -> Self {
        Self { bounds, is_group_head, kind: NodeKind::Leaf(object) }
    }

    /// Builds a non-group-head internal node over `children`.
    ///
    /// # Panics
    /// Panics if `children` is empty.
    pub fn internal(children: Vec<Self>) -> Self {
        assert!(!children.is_empty(), "internal node requires at least one child");
        let bounds = union_of(&children);
        Self { bounds, is_group_head: false, kind: NodeKind::Internal(children) }
    }

    /// Temporary stand-in used while a node's contents are moved around.
    fn vacant(bounds: Bounds) -> Self {
        Self { bounds, is_group_head: false, kind: NodeKind::Internal(Vec::new()) }
    }

    /// Cached bounds of the subtree.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Whether this node heads an atomic group.
    pub fn is_group_head(&self) -> bool {
        self.is_group_head
    }

    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// The wrapped object for leaves.
    pub fn object(&self) -> Option<T> {
        match self.kind {
            NodeKind::Leaf(obj) => Some(obj),
            NodeKind::Internal(_) => None,
        }
    }

    /// Children of an internal node (empty for leaves).
    pub fn children(&self) -> &[Self] {
        match &self.kind {
            NodeKind::Leaf(_) => &[],
            NodeKind::Internal(children) => children,
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Self] {
        match &mut self.kind {
            NodeKind::Leaf(_) => &mut [],
            NodeKind::Internal(children) => children,
        }
    }

    /// Number of leaves in the subtree.
    pub fn object_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(_) => 1,
            NodeKind::Internal(children) => children.iter().map(Self::object_count).sum(),
        }
    }

    /// Length of the longest root-to-leaf branch below this node (leaves are 0).
    pub fn longest_branch(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(_) => 0,
            NodeKind::Internal(children) => {
                1 + children.iter().map(Self::longest_branch).max().unwrap_or(0)
            }
        }
    }

    /// Objects of every leaf in the subtree, depth-first.
    pub fn objects(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.object_count());
        self.for_each_leaf(&mut |obj, _| out.push(obj));
        out
    }

    pub(crate) fn for_each_leaf(&self, f: &mut impl FnMut(T, &Bounds)) {
        match &self.kind {
            NodeKind::Leaf(obj) => f(*obj, &self.bounds),
            NodeKind::Internal(children) => {
                for child in children {
                    child.for_each_leaf(f);
                }
            }
        }
    }

    /// Recomputes this node's bounds from its direct children.
    pub(crate) fn recalculate_bounds(&mut self) {
        if let NodeKind::Internal(children) = &self.kind {
            if !children.is_empty() {
                self.bounds = union_of(children);
            }
        }
    }

    /// Recomputes leaf bounds through `bounds_of`, then every internal node
    /// bottom-up.
    pub(crate) fn refresh_bounds_recursive(&mut self, bounds_of: &mut impl FnMut(T) -> Bounds) {
        match &mut self.kind {
            NodeKind::Leaf(obj) => self.bounds = bounds_of(*obj),
            NodeKind::Internal(children) => {
                for child in children.iter_mut() {
                    child.refresh_bounds_recursive(bounds_of);
                }
                self.bounds = union_of(children);
            }
        }
    }

    /// Inserts `new` next to this node, never descending into a group head.
    ///
    /// A group head is pushed down under a fresh (non-group) parent instead,
    /// so the group's internal structure is untouched by outside insertions.
    pub(crate) fn add_outside<const B: usize>(&mut self, new: Self) {
        let new_bounds = new.bounds;
        if self.is_group_head {
            let group = mem::replace(self, Self::vacant(new_bounds));
            *self = Self::internal(vec![group, new]);
        } else {
            self.add_inside::<B>(new);
        }
        self.bounds = self.bounds.union(&new_bounds);
    }

    /// Inserts `new` into this node's subtree.
    ///
    /// A leaf is split into a two-child node that inherits the leaf's
    /// group-head flag. A full internal node hands `new` to the child whose
    /// union with it is cheapest (first index wins ties) through
    /// [`Self::add_outside`], so nested groups stay intact.
    pub(crate) fn add_inside<const B: usize>(&mut self, mut new: Self) {
        let new_bounds = new.bounds;
        match &mut self.kind {
            NodeKind::Leaf(_) => {
                let mut old = mem::replace(self, Self::vacant(new_bounds));
                let inherited = old.is_group_head;
                old.is_group_head = false;
                // Joining a pinned leaf makes `new` a member of that group.
                if inherited {
                    new.is_group_head = false;
                }
                *self = Self::internal(vec![old, new]);
                self.is_group_head = inherited;
            }
            NodeKind::Internal(children) => {
                if children.len() < B {
                    children.push(new);
                } else {
                    let best = cheapest_insertion_index(children, &new_bounds);
                    children[best].add_outside::<B>(new);
                }
            }
        }
        self.bounds = self.bounds.union(&new_bounds);
    }

    /// Swap-removes child `index`; a node left with one child collapses into
    /// it, staying a group head if either side was one.
    pub(crate) fn remove_child(&mut self, index: usize) -> Self {
        let NodeKind::Internal(children) = &mut self.kind else {
            unreachable!("remove_child called on a leaf");
        };
        assert!(index < children.len(), "child index {index} out of range");
        let removed = children.swap_remove(index);
        if children.len() == 1 {
            let was_group_head = self.is_group_head;
            if let Some(survivor) = children.pop() {
                *self = survivor;
                self.is_group_head |= was_group_head;
            }
        } else {
            self.recalculate_bounds();
        }
        removed
    }

    /// Replaces the object of the first leaf matching `find`, pruning by
    /// `bounds`.
    pub(crate) fn find_and_replace(&mut self, find: T, replace_with: T, bounds: &Bounds) -> bool {
        match &mut self.kind {
            NodeKind::Leaf(obj) => {
                if *obj == find {
                    *obj = replace_with;
                    return true;
                }
                false
            }
            NodeKind::Internal(children) => children
                .iter_mut()
                .filter(|c| c.bounds.contains(bounds))
                .any(|c| c.find_and_replace(find, replace_with, bounds)),
        }
    }
}

/// Union of the bounds of a non-empty node list.
pub(crate) fn union_of<T>(nodes: &[TreeNode<T>]) -> Bounds {
    let mut bounds = nodes[0].bounds;
    for node in &nodes[1..] {
        bounds = bounds.union(&node.bounds);
    }
    bounds
}

fn cheapest_insertion_index<T>(children: &[TreeNode<T>], new_bounds: &Bounds) -> usize {
    let mut best_index = 0;
    let mut best_cost = children[0].bounds.union(new_bounds).cost();
    for (i, child) in children.iter().enumerate().skip(1) {
        let cost = child.bounds.union(new_bounds).cost();
        if cost < best_cost {
            best_cost = cost;
            best_index = i;
        }
    }
    best_index
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use p3d_geom::Position;

    fn cube(x: f64) -> Bounds {
        Bounds::new(Position::new(x, 0.0, 0.0), Position::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn leaf_split_inherits_group_head_flag() {
        let mut node = TreeNode::leaf(1_u32, cube(0.0), true);
        node.add_inside::<4>(TreeNode::leaf(2, cube(2.0), false));
        assert!(node.is_group_head());
        assert!(node.children().iter().all(|c| !c.is_group_head()));
        assert_eq!(node.bounds(), &cube(0.0).union(&cube(2.0)));
    }

    #[test]
    fn add_outside_wraps_group_heads() {
        let mut group = TreeNode::leaf(1_u32, cube(0.0), true);
        group.add_outside::<4>(TreeNode::leaf(2, cube(5.0), true));
        assert!(!group.is_group_head());
        assert_eq!(group.children().len(), 2);
        assert!(group.children().iter().all(TreeNode::is_group_head));
    }

    #[test]
    fn collapse_keeps_group_head_of_parent() {
        let mut node = TreeNode::leaf(1_u32, cube(0.0), true);
        node.add_inside::<4>(TreeNode::leaf(2, cube(2.0), false));
        let removed = node.remove_child(1);
        assert_eq!(removed.object(), Some(2));
        assert!(node.is_leaf());
        assert!(node.is_group_head());
        assert_eq!(node.bounds(), &cube(0.0));
    }

    #[test]
    fn full_node_routes_to_cheapest_child() {
        let mut node = TreeNode::internal(vec![
            TreeNode::leaf(0_u32, cube(0.0), false),
            TreeNode::leaf(1, cube(10.0), false),
        ]);
        node.add_inside::<2>(TreeNode::leaf(2, cube(11.0), false));
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.children()[1].objects(), vec![1, 2]);
    }
}
