// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Local structural optimisation (`improve_structure`).
//!
//! Two greedy passes per internal node, after its children were improved:
//! - horizontal: for intersecting non-group siblings, redistribute their
//!   grandchildren between the two with an exhaustive two-way partition
//!   search;
//! - vertical: exchange a sibling with one child of an overlapping
//!   non-group internal sibling when that shrinks the latter.
//!
//! Nodes only ever move as whole subtrees between non-group parents, so no
//! leaf crosses a group-head boundary.

use core::mem;

use p3d_geom::Bounds;
use tracing::debug;

use super::node::{NodeKind, TreeNode};
use super::BoundsTree;

impl<T: Copy + Eq, const B: usize> BoundsTree<T, B> {
    /// Runs one optimisation pass over the whole tree.
    ///
    /// Never increases [`BoundsTree::total_cost`] and never changes which
    /// objects belong to which group.
    pub fn improve_structure(&mut self) {
        let () = Self::BRANCH_FACTOR_CHECK;
        if let Some(root) = &mut self.root {
            let before = root.bounds.cost();
            improve_node::<T, B>(root);
            debug!(root_cost = before, depth = root.longest_branch(), "improved tree structure");
        }
    }
}

fn improve_node<T: Copy + Eq, const B: usize>(node: &mut TreeNode<T>) {
    let NodeKind::Internal(children) = &mut node.kind else {
        return;
    };
    for child in children.iter_mut() {
        improve_node::<T, B>(child);
    }
    let n = children.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = pair_mut(children, i, j);
            if a.is_group_head || b.is_group_head || !a.bounds.intersects(&b.bounds) {
                continue;
            }
            optimize_pair_horizontal::<T, B>(a, b);
        }
    }
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (group, other) = pair_mut(children, i, j);
            if group.is_leaf() || group.is_group_head || !group.bounds.intersects(&other.bounds) {
                continue;
            }
            optimize_pair_vertical(other, group);
        }
    }
}

fn pair_mut<X>(items: &mut [X], i: usize, j: usize) -> (&mut X, &mut X) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// Bounds of the nodes a pair contributes to the partition search: a leaf
/// stands for itself, an internal node for its children.
fn candidate_bounds<T: Copy + Eq>(node: &TreeNode<T>, out: &mut Vec<Bounds>) {
    if node.is_leaf() {
        out.push(node.bounds);
    } else {
        out.extend(node.children().iter().map(|c| c.bounds));
    }
}

fn internal_cost<T: Copy + Eq>(node: &TreeNode<T>) -> f64 {
    if node.is_leaf() {
        0.0
    } else {
        node.bounds.cost()
    }
}

struct PartitionSearch<'a> {
    candidates: &'a [Bounds],
    capacity: usize,
    best_cost: f64,
    best_mask: Option<u64>,
}

impl PartitionSearch<'_> {
    /// Assigns candidate `index` onwards; bit `i` of `mask` set means group A.
    /// Candidate 0 is always in A, which removes mirrored duplicates.
    fn visit(&mut self, index: usize, mask: u64, count_a: usize, a: Option<Bounds>, b: Option<Bounds>) {
        if index == self.candidates.len() {
            if let (Some(a), Some(b)) = (a, b) {
                let cost = a.cost() + b.cost();
                if cost < self.best_cost {
                    self.best_cost = cost;
                    self.best_mask = Some(mask);
                }
            }
            return;
        }
        let count_b = index - count_a;
        let bounds = self.candidates[index];
        if count_a < self.capacity {
            let a = Some(a.map_or(bounds, |a| a.union(&bounds)));
            self.visit(index + 1, mask | (1 << index), count_a + 1, a, b);
        }
        if index > 0 && count_b < self.capacity {
            let b = Some(b.map_or(bounds, |b| b.union(&bounds)));
            self.visit(index + 1, mask, count_a, a, b);
        }
    }
}

fn take_members<T: Copy + Eq>(node: &mut TreeNode<T>) -> Vec<TreeNode<T>> {
    let placeholder = TreeNode { bounds: node.bounds, is_group_head: false, kind: NodeKind::Internal(Vec::new()) };
    let taken = mem::replace(node, placeholder);
    match taken.kind {
        NodeKind::Leaf(_) => vec![taken],
        NodeKind::Internal(children) => children,
    }
}

fn optimize_pair_horizontal<T: Copy + Eq, const B: usize>(first: &mut TreeNode<T>, second: &mut TreeNode<T>) {
    if first.is_leaf() && second.is_leaf() {
        return;
    }
    let mut candidates = Vec::with_capacity(2 * B);
    candidate_bounds(first, &mut candidates);
    candidate_bounds(second, &mut candidates);

    let mut search = PartitionSearch {
        candidates: &candidates,
        capacity: B,
        best_cost: first.bounds.cost() + second.bounds.cost(),
        best_mask: None,
    };
    search.visit(0, 0, 0, None, None);
    let Some(mask) = search.best_mask else {
        return;
    };

    let in_a = |i: usize| mask & (1 << i) != 0;
    let count_a = (0..candidates.len()).filter(|&i| in_a(i)).count();
    let count_b = candidates.len() - count_a;
    // The single-member side is used directly instead of being wrapped.
    let (wide, single_is_a) = match (count_a, count_b) {
        (1, _) => (count_b, true),
        (_, 1) => (count_a, false),
        _ => (0, false),
    };
    let wide_bounds = |want_a: bool| {
        let mut it = candidates.iter().enumerate().filter(|(i, _)| in_a(*i) == want_a).map(|(_, b)| *b);
        let seed = it.next().unwrap_or(candidates[0]);
        it.fold(seed, |acc, b| acc.union(&b))
    };
    let new_internal_cost = if wide > 0 {
        wide_bounds(!single_is_a).cost()
    } else {
        wide_bounds(true).cost() + wide_bounds(false).cost()
    };
    if new_internal_cost > internal_cost(first) + internal_cost(second) {
        return;
    }

    let mut group_a = Vec::with_capacity(count_a);
    let mut group_b = Vec::with_capacity(count_b);
    let members = take_members(first).into_iter().chain(take_members(second));
    for (i, member) in members.enumerate() {
        if in_a(i) {
            group_a.push(member);
        } else {
            group_b.push(member);
        }
    }
    if group_a.len() == 1 {
        mem::swap(&mut group_a, &mut group_b);
    }
    *first = TreeNode::internal(group_a);
    *second = match <[TreeNode<T>; 1]>::try_from(group_b) {
        Ok([only]) => only,
        Err(group_b) => TreeNode::internal(group_b),
    };
}

fn optimize_pair_vertical<T: Copy + Eq>(node: &mut TreeNode<T>, group: &mut TreeNode<T>) {
    let original_cost = group.bounds.cost();
    let mut best_cost = original_cost;
    let mut best_index = None;
    let children = group.children();
    for i in 0..children.len() {
        let mut resulting = node.bounds;
        for (j, child) in children.iter().enumerate() {
            if i != j {
                resulting = resulting.union(&child.bounds);
            }
        }
        let cost = resulting.cost();
        if cost < best_cost {
            best_cost = cost;
            best_index = Some(i);
        }
    }
    if let Some(index) = best_index {
        mem::swap(node, &mut group.children_mut()[index]);
        group.recalculate_bounds();
    }
}
