// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Root-to-node cursor used by removal and bounds propagation.

use p3d_geom::Bounds;

use super::node::{NodeKind, TreeNode};

/// Path of child indices from the root to a node.
///
/// An empty path addresses the root itself. A stack is only meaningful for
/// the tree state it was produced from; any structural mutation invalidates
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStack {
    path: Vec<usize>,
}

impl NodeStack {
    /// Cursor at the root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Child indices from the root.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Number of edges between the root and the addressed node.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub(crate) fn truncated(&self, depth: usize) -> Self {
        Self { path: self.path[..depth].to_vec() }
    }

    /// Depth-first search for `object`, pruned by subtrees whose bounds
    /// contain `bounds` (the object's cached leaf bounds).
    pub(crate) fn find<T: Copy + Eq>(root: &TreeNode<T>, object: T, bounds: &Bounds) -> Option<Self> {
        let mut stack = Self::root();
        if stack.descend(root, object, bounds) {
            Some(stack)
        } else {
            None
        }
    }

    fn descend<T: Copy + Eq>(&mut self, node: &TreeNode<T>, object: T, bounds: &Bounds) -> bool {
        match &node.kind {
            NodeKind::Leaf(obj) => *obj == object,
            NodeKind::Internal(children) => {
                for (i, child) in children.iter().enumerate() {
                    if !child.bounds.contains(bounds) {
                        continue;
                    }
                    self.path.push(i);
                    if self.descend(child, object, bounds) {
                        return true;
                    }
                    self.path.pop();
                }
                false
            }
        }
    }

    /// Cursor at the deepest group head on the path (the node itself
    /// included), or `None` when the addressed node is not inside a group.
    pub(crate) fn rise_to_group_head<T: Copy + Eq>(&self, root: &TreeNode<T>) -> Option<Self> {
        let mut node = root;
        let mut head = node.is_group_head.then_some(0);
        for (depth, &i) in self.path.iter().enumerate() {
            node = &node.children()[i];
            if node.is_group_head {
                head = Some(depth + 1);
            }
        }
        head.map(|depth| self.truncated(depth))
    }
}

pub(crate) fn node_at<'a, T: Copy + Eq>(root: &'a TreeNode<T>, stack: &NodeStack) -> &'a TreeNode<T> {
    stack.path.iter().fold(root, |node, &i| &node.children()[i])
}

pub(crate) fn node_at_mut<'a, T: Copy + Eq>(
    root: &'a mut TreeNode<T>,
    stack: &NodeStack,
) -> &'a mut TreeNode<T> {
    let mut node = root;
    for &i in &stack.path {
        node = &mut node.children_mut()[i];
    }
    node
}

/// Recomputes cached bounds of every ancestor of the node at `path`, deepest
/// first.
pub(crate) fn update_bounds_to_top<T: Copy + Eq>(node: &mut TreeNode<T>, path: &[usize]) {
    if let Some((&i, rest)) = path.split_first() {
        update_bounds_to_top(&mut node.children_mut()[i], rest);
        node.recalculate_bounds();
    }
}

/// Unions `added` into the cached bounds of every ancestor of `path`.
pub(crate) fn expand_bounds_to_top<T: Copy + Eq>(node: &mut TreeNode<T>, path: &[usize], added: &Bounds) {
    if let Some((&i, rest)) = path.split_first() {
        expand_bounds_to_top(&mut node.children_mut()[i], rest, added);
        node.bounds = node.bounds.union(added);
    }
}

/// Removes the node at `path` (non-empty) from its parent, recomputing
/// bounds on the way back up.
pub(crate) fn remove_along<T: Copy + Eq>(node: &mut TreeNode<T>, path: &[usize]) -> TreeNode<T> {
    match path {
        [index] => node.remove_child(*index),
        [index, rest @ ..] => {
            let removed = remove_along(&mut node.children_mut()[*index], rest);
            node.recalculate_bounds();
            removed
        }
        [] => unreachable!("remove_along requires a non-empty path"),
    }
}
