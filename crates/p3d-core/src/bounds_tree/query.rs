// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read-only traversals: iteration, filtered visits, colliding pairs.

use p3d_geom::Bounds;

use super::node::{NodeKind, TreeNode};
use super::stack::node_at;
use super::BoundsTree;
use crate::filter::SpatialFilter;

/// Depth-first iterator over `(object, bounds)` of every leaf.
#[derive(Debug, Clone)]
pub struct TreeIter<'a, T> {
    stack: Vec<&'a TreeNode<T>>,
}

impl<'a, T> TreeIter<'a, T> {
    fn new(root: Option<&'a TreeNode<T>>) -> Self {
        Self { stack: root.into_iter().collect() }
    }
}

impl<T: Copy> Iterator for TreeIter<'_, T> {
    type Item = (T, Bounds);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match &node.kind {
                NodeKind::Leaf(obj) => return Some((*obj, node.bounds)),
                NodeKind::Internal(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}

impl<T: Copy + Eq, const B: usize> BoundsTree<T, B> {
    /// Iterates every stored object with its cached bounds.
    pub fn iter(&self) -> TreeIter<'_, T> {
        TreeIter::new(self.root.as_ref())
    }

    /// Calls `f` for every object.
    pub fn for_each(&self, mut f: impl FnMut(T, &Bounds)) {
        if let Some(root) = &self.root {
            root.for_each_leaf(&mut f);
        }
    }

    /// Calls `f` for every object whose leaf and ancestors pass `filter`.
    pub fn for_each_filtered(&self, filter: &impl SpatialFilter, mut f: impl FnMut(T, &Bounds)) {
        fn visit<T: Copy>(node: &TreeNode<T>, filter: &impl SpatialFilter, f: &mut impl FnMut(T, &Bounds)) {
            if !filter.test_bounds(&node.bounds) {
                return;
            }
            match &node.kind {
                NodeKind::Leaf(obj) => f(*obj, &node.bounds),
                NodeKind::Internal(children) => {
                    for child in children {
                        visit(child, filter, f);
                    }
                }
            }
        }
        if let Some(root) = &self.root {
            visit(root, filter, &mut f);
        }
    }

    /// Calls `f` for every member of the group containing `group_member`.
    pub fn for_each_in_group(&self, group_member: T, member_bounds: &Bounds, mut f: impl FnMut(T, &Bounds)) {
        let Ok(head) = self.group_head_stack(group_member, member_bounds) else {
            return;
        };
        if let Some(root) = &self.root {
            node_at(root, &head).for_each_leaf(&mut f);
        }
    }

    /// Calls `f` once for every pair of objects whose bounds intersect,
    /// skipping pairs inside the same group.
    pub fn for_each_colliding_pair(&self, mut f: impl FnMut(T, T)) {
        if let Some(root) = &self.root {
            pairs_within(root, &mut f);
        }
    }

    /// Calls `f(a, b)` for every `a` in `self` and `b` in `other` whose bounds
    /// intersect.
    pub fn for_each_colliding_pair_between<const C: usize>(&self, other: &BoundsTree<T, C>, mut f: impl FnMut(T, T)) {
        if let (Some(a), Some(b)) = (&self.root, &other.root) {
            pairs_between(a, b, &mut f);
        }
    }
}

fn pairs_within<T: Copy>(node: &TreeNode<T>, f: &mut impl FnMut(T, T)) {
    // Everything below a group head belongs to that one group.
    if node.is_group_head {
        return;
    }
    let NodeKind::Internal(children) = &node.kind else {
        return;
    };
    for child in children {
        pairs_within(child, f);
    }
    for (i, a) in children.iter().enumerate() {
        for b in &children[i + 1..] {
            pairs_between(a, b, f);
        }
    }
}

fn pairs_between<T: Copy>(a: &TreeNode<T>, b: &TreeNode<T>, f: &mut impl FnMut(T, T)) {
    if !a.bounds.intersects(&b.bounds) {
        return;
    }
    match (&a.kind, &b.kind) {
        (NodeKind::Leaf(x), NodeKind::Leaf(y)) => f(*x, *y),
        (NodeKind::Leaf(_), NodeKind::Internal(bs)) => {
            for child in bs {
                pairs_between(a, child, f);
            }
        }
        (NodeKind::Internal(as_), NodeKind::Leaf(_)) => {
            for child in as_ {
                pairs_between(child, b, f);
            }
        }
        (NodeKind::Internal(as_), NodeKind::Internal(bs)) => {
            // Split the larger volume first.
            if a.bounds.cost() >= b.bounds.cost() {
                for child in as_ {
                    pairs_between(child, b, f);
                }
            } else {
                for child in bs {
                    pairs_between(a, child, f);
                }
            }
        }
    }
}
