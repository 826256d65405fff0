// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dynamic bounding-volume hierarchy with atomic object groups.
//!
//! The tree stores opaque `Copy` handles with their world-space [`Bounds`].
//! Objects that must stay together (the parts of one rigid assembly) are
//! inserted as a *group*: a subtree whose root is flagged as group head.
//! Outside insertions never descend into a group head, structural
//! optimisation never moves a node across one, and removal of a group takes
//! the whole subtree.
//!
//! Nodes own their children directly; removal is swap-and-truncate on the
//! parent's child vector, and a parent left with a single child collapses
//! into it.

mod node;
mod optimize;
mod query;
mod stack;

use p3d_geom::Bounds;
use tracing::trace;

pub use node::{NodeKind, TreeNode};
pub use query::TreeIter;
pub use stack::NodeStack;

use crate::error::InvariantViolation;
use stack::{expand_bounds_to_top, node_at, node_at_mut, remove_along, update_bounds_to_top};

/// Default maximum number of children per internal node.
pub const DEFAULT_BRANCH_FACTOR: usize = 8;

/// Bounding-volume hierarchy over object handles `T` with branching factor `B`.
#[derive(Debug, Clone)]
pub struct BoundsTree<T, const B: usize = DEFAULT_BRANCH_FACTOR> {
    root: Option<TreeNode<T>>,
    object_count: usize,
}

impl<T, const B: usize> Default for BoundsTree<T, B> {
    fn default() -> Self {
        Self { root: None, object_count: 0 }
    }
}

impl<T: Copy + Eq, const B: usize> BoundsTree<T, B> {
    /// Compile-time bound on `B`: every node splits, and the partition search
    /// tracks up to `2 B` candidates in a `u64` mask.
    pub(crate) const BRANCH_FACTOR_CHECK: () =
        assert!(B >= 2 && 2 * B <= u64::BITS as usize, "branching factor must be in 2..=32");

    /// Creates an empty tree.
    pub fn new() -> Self {
        let () = Self::BRANCH_FACTOR_CHECK;
        Self::default()
    }

    /// Root node, if any.
    pub fn root(&self) -> Option<&TreeNode<T>> {
        self.root.as_ref()
    }

    /// Number of objects in the tree.
    pub fn len(&self) -> usize {
        self.object_count
    }

    /// Whether the tree holds no objects.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Bounds of the whole tree.
    pub fn bounds(&self) -> Option<Bounds> {
        self.root.as_ref().map(|r| r.bounds)
    }

    /// Longest root-to-leaf branch (0 for a single leaf or an empty tree).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::longest_branch)
    }

    /// Removes every object.
    pub fn clear(&mut self) {
        self.root = None;
        self.object_count = 0;
    }

    /// Builds a detached group node: `members[0]` becomes the pinned head and
    /// the remaining members are inserted inside it.
    pub fn build_group(members: impl IntoIterator<Item = (T, Bounds)>) -> Option<TreeNode<T>> {
        let mut members = members.into_iter();
        let (first, first_bounds) = members.next()?;
        let mut group = TreeNode::leaf(first, first_bounds, true);
        for (obj, bounds) in members {
            group.add_inside::<B>(TreeNode::leaf(obj, bounds, false));
        }
        Some(group)
    }

    /// Inserts a loose (ungrouped) object at the root.
    pub fn add(&mut self, object: T, bounds: Bounds) {
        self.add_node_outside(TreeNode::leaf(object, bounds, false));
    }

    /// Inserts a single-object group.
    pub fn add_single_group(&mut self, object: T, bounds: Bounds) {
        self.add_node_outside(TreeNode::leaf(object, bounds, true));
    }

    /// Inserts `group` as an atomic group (its root is flagged group head).
    pub fn add_group(&mut self, mut group: TreeNode<T>) {
        group.is_group_head = true;
        self.add_node_outside(group);
    }

    fn add_node_outside(&mut self, node: TreeNode<T>) {
        let () = Self::BRANCH_FACTOR_CHECK;
        self.object_count += node.object_count();
        match &mut self.root {
            None => self.root = Some(node),
            Some(root) => root.add_outside::<B>(node),
        }
    }

    /// Inserts `object` into the group containing `group_member`, which must
    /// be stored inside a group.
    pub fn add_to_group(
        &mut self,
        object: T,
        bounds: Bounds,
        group_member: T,
        member_bounds: &Bounds,
    ) -> Result<(), InvariantViolation> {
        let head = self.group_head_stack(group_member, member_bounds)?;
        self.add_node_at_head(TreeNode::leaf(object, bounds, false), &head)
    }

    fn add_node_at_head(&mut self, mut node: TreeNode<T>, head: &NodeStack) -> Result<(), InvariantViolation> {
        let added = node.bounds;
        node.is_group_head = false;
        let count = node.object_count();
        let root = self.root_mut()?;
        node_at_mut(root, head).add_inside::<B>(node);
        expand_bounds_to_top(root, head.path(), &added);
        self.object_count += count;
        Ok(())
    }

    /// Cursor to `object`'s leaf, or `None` if it is not in the tree.
    ///
    /// `bounds` must be the leaf's cached bounds.
    pub fn find(&self, object: T, bounds: &Bounds) -> Option<NodeStack> {
        self.root.as_ref().and_then(|root| NodeStack::find(root, object, bounds))
    }

    /// Whether `object` is stored with cached `bounds`.
    pub fn contains(&self, object: T, bounds: &Bounds) -> bool {
        self.find(object, bounds).is_some()
    }

    /// Node addressed by `stack`; `None` for an empty tree.
    ///
    /// `stack` must come from this tree with no mutation in between.
    pub fn node(&self, stack: &NodeStack) -> Option<&TreeNode<T>> {
        self.root.as_ref().map(|root| node_at(root, stack))
    }

    /// Cursor to the group head enclosing the node at `stack`.
    pub fn group_head_of(&self, stack: &NodeStack) -> Option<NodeStack> {
        self.root.as_ref().and_then(|root| stack.rise_to_group_head(root))
    }

    /// Removes and returns the node at `stack`, collapsing single-child
    /// parents and recomputing every ancestor's bounds.
    pub fn remove_at(&mut self, stack: &NodeStack) -> Result<TreeNode<T>, InvariantViolation> {
        let removed = if stack.depth() == 0 {
            let Some(root) = self.root.take() else { return Err(InvariantViolation::EmptyTree) };
            root
        } else {
            remove_along(self.root_mut()?, stack.path())
        };
        self.object_count -= removed.object_count();
        trace!(removed = removed.object_count(), remaining = self.object_count, "removed subtree");
        Ok(removed)
    }

    /// Removes `object`, which must be stored with cached `bounds`.
    pub fn remove(&mut self, object: T, bounds: &Bounds) -> Result<(), InvariantViolation> {
        let stack = self.find_required(object, bounds)?;
        self.remove_at(&stack).map(drop)
    }

    /// Removes the whole group containing `group_member` and returns it.
    pub fn remove_group(&mut self, group_member: T, member_bounds: &Bounds) -> Result<TreeNode<T>, InvariantViolation> {
        let head = self.group_head_stack(group_member, member_bounds)?;
        self.remove_at(&head)
    }

    /// Detaches the group containing `group_member` as a standalone node,
    /// ready to be re-inserted elsewhere with [`Self::add_group`].
    pub fn grab_group(&mut self, group_member: T, member_bounds: &Bounds) -> Result<TreeNode<T>, InvariantViolation> {
        self.remove_group(group_member, member_bounds)
    }

    /// Objects of the group containing `group_member`.
    pub fn group_members(&self, group_member: T, member_bounds: &Bounds) -> Result<Vec<T>, InvariantViolation> {
        let head = self.group_head_stack(group_member, member_bounds)?;
        self.node(&head).map(TreeNode::objects).ok_or(InvariantViolation::EmptyTree)
    }

    /// Splits `object` out of its group into a new single-object group.
    pub fn move_out_of_group(&mut self, object: T, bounds: &Bounds) -> Result<(), InvariantViolation> {
        let stack = self.find_required(object, bounds)?;
        let mut leaf = self.remove_at(&stack)?;
        leaf.is_group_head = true;
        self.add_node_outside(leaf);
        Ok(())
    }

    /// Moves every object of `other`'s group into `target`'s group. Both
    /// groups are located before anything moves.
    pub fn merge_groups(
        &mut self,
        target: T,
        target_bounds: &Bounds,
        other: T,
        other_bounds: &Bounds,
    ) -> Result<(), InvariantViolation> {
        let target_head = self.group_head_stack(target, target_bounds)?;
        let other_head = self.group_head_stack(other, other_bounds)?;
        if target_head == other_head {
            return Ok(());
        }
        let moved = self.remove_at(&other_head)?;
        let head = self.group_head_stack(target, target_bounds)?;
        self.add_node_at_head(moved, &head)
    }

    /// Replaces the cached bounds of one object.
    pub fn update_object_bounds(
        &mut self,
        object: T,
        old_bounds: &Bounds,
        new_bounds: Bounds,
    ) -> Result<(), InvariantViolation> {
        let stack = self.find_required(object, old_bounds)?;
        let root = self.root_mut()?;
        node_at_mut(root, &stack).bounds = new_bounds;
        update_bounds_to_top(root, stack.path());
        Ok(())
    }

    /// Re-reads the bounds of every object in `group_member`'s group through
    /// `bounds_of`, then fixes up the ancestors.
    pub fn update_group_bounds(
        &mut self,
        group_member: T,
        member_bounds: &Bounds,
        mut bounds_of: impl FnMut(T) -> Bounds,
    ) -> Result<(), InvariantViolation> {
        let head = self.group_head_stack(group_member, member_bounds)?;
        let root = self.root_mut()?;
        node_at_mut(root, &head).refresh_bounds_recursive(&mut bounds_of);
        update_bounds_to_top(root, head.path());
        Ok(())
    }

    /// Re-reads every object's bounds.
    pub fn refresh_all_bounds(&mut self, mut bounds_of: impl FnMut(T) -> Bounds) {
        if let Some(root) = &mut self.root {
            root.refresh_bounds_recursive(&mut bounds_of);
        }
    }

    /// Swaps the handle stored for `find` with `replace_with`.
    pub fn find_and_replace(&mut self, find: T, replace_with: T, bounds: &Bounds) -> bool {
        self.root.as_mut().is_some_and(|root| root.find_and_replace(find, replace_with, bounds))
    }

    /// Sum of the cost of every internal node; the quantity structural
    /// optimisation never increases.
    pub fn total_cost(&self) -> f64 {
        fn visit<T: Copy + Eq>(node: &TreeNode<T>) -> f64 {
            if node.is_leaf() {
                0.0
            } else {
                node.bounds.cost() + node.children().iter().map(visit).sum::<f64>()
            }
        }
        self.root.as_ref().map_or(0.0, visit)
    }

    /// Recomputes every cached bound and checks the structural invariants.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let Some(root) = &self.root else {
            return if self.object_count == 0 {
                Ok(())
            } else {
                Err(InvariantViolation::ObjectCountMismatch { cached: self.object_count, actual: 0 })
            };
        };
        validate_node::<T, B>(root, 0, false)?;
        let actual = root.object_count();
        if actual != self.object_count {
            return Err(InvariantViolation::ObjectCountMismatch { cached: self.object_count, actual });
        }
        Ok(())
    }

    fn find_required(&self, object: T, bounds: &Bounds) -> Result<NodeStack, InvariantViolation> {
        self.find(object, bounds).ok_or(InvariantViolation::ObjectNotInTree)
    }

    fn group_head_stack(&self, group_member: T, member_bounds: &Bounds) -> Result<NodeStack, InvariantViolation> {
        let leaf = self.find_required(group_member, member_bounds)?;
        self.group_head_of(&leaf).ok_or(InvariantViolation::NotInGroup)
    }

    fn root_mut(&mut self) -> Result<&mut TreeNode<T>, InvariantViolation> {
        self.root.as_mut().ok_or(InvariantViolation::EmptyTree)
    }
}

fn validate_node<T: Copy + Eq, const B: usize>(
    node: &TreeNode<T>,
    depth: usize,
    inside_group: bool,
) -> Result<(), InvariantViolation> {
    if inside_group && node.is_group_head {
        return Err(InvariantViolation::NestedGroupHead { depth });
    }
    let children = node.children();
    if node.is_leaf() {
        return Ok(());
    }
    if children.len() < 2 {
        return Err(InvariantViolation::DegenerateNode { depth, children: children.len() });
    }
    if children.len() > B {
        return Err(InvariantViolation::BranchOverflow { depth, children: children.len(), capacity: B });
    }
    let recomputed = node::union_of(children);
    if recomputed != node.bounds {
        return Err(InvariantViolation::StaleBounds {
            depth,
            cached: node.bounds,
            recomputed,
        });
    }
    let inside_group = inside_group || node.is_group_head;
    for child in children {
        validate_node::<T, B>(child, depth + 1, inside_group)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use p3d_geom::Position;

    fn cube(x: f64) -> Bounds {
        Bounds::new(Position::new(x, x, x), Position::new(x + 1.0, x + 1.0, x + 1.0))
    }

    #[test]
    fn empty_tree_is_valid() {
        let tree: BoundsTree<u32, 4> = BoundsTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        tree.validate().unwrap();
    }

    #[test]
    fn find_returns_cursor_and_remove_collapses() {
        let mut tree: BoundsTree<u32, 4> = BoundsTree::new();
        for i in 0..3 {
            tree.add(i, cube(f64::from(i) * 2.0));
        }
        let stack = tree.find(1, &cube(2.0)).unwrap();
        assert_eq!(stack.depth(), 1);
        assert!(tree.node(&stack).unwrap().is_leaf());
        tree.remove_at(&stack).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(1, &cube(2.0)));
        tree.remove(0, &cube(0.0)).unwrap();
        assert!(tree.root().unwrap().is_leaf());
        assert_eq!(tree.bounds(), Some(cube(4.0)));
    }

    #[test]
    fn group_operations_keep_members_together() {
        let mut tree: BoundsTree<u32, 4> = BoundsTree::new();
        let group = BoundsTree::<u32, 4>::build_group([(10, cube(0.0)), (11, cube(1.0))]).unwrap();
        tree.add_group(group);
        for i in 0..6 {
            tree.add_single_group(i, cube(f64::from(i) * 3.0 + 5.0));
        }
        tree.add_to_group(12, cube(2.0), 11, &cube(1.0)).unwrap();
        let mut members = tree.group_members(10, &cube(0.0)).unwrap();
        members.sort_unstable();
        assert_eq!(members, vec![10, 11, 12]);
        tree.validate().unwrap();

        let removed = tree.remove_group(12, &cube(2.0)).unwrap();
        assert_eq!(removed.object_count(), 3);
        assert_eq!(tree.len(), 6);
        tree.validate().unwrap();
    }

    #[test]
    fn merge_and_split_groups() {
        let mut tree: BoundsTree<u32, 4> = BoundsTree::new();
        tree.add_single_group(1, cube(0.0));
        tree.add_single_group(2, cube(4.0));
        tree.merge_groups(1, &cube(0.0), 2, &cube(4.0)).unwrap();
        assert_eq!(tree.group_members(2, &cube(4.0)).unwrap().len(), 2);
        tree.merge_groups(1, &cube(0.0), 2, &cube(4.0)).unwrap();
        assert_eq!(tree.len(), 2);
        tree.move_out_of_group(2, &cube(4.0)).unwrap();
        assert_eq!(tree.group_members(1, &cube(0.0)).unwrap(), vec![1]);
        assert_eq!(tree.group_members(2, &cube(4.0)).unwrap(), vec![2]);
        tree.validate().unwrap();
    }

    #[test]
    fn update_object_bounds_propagates() {
        let mut tree: BoundsTree<u32, 4> = BoundsTree::new();
        tree.add(1, cube(0.0));
        tree.add(2, cube(2.0));
        tree.update_object_bounds(2, &cube(2.0), cube(9.0)).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.bounds(), Some(cube(0.0).union(&cube(9.0))));
    }

    #[test]
    fn missing_objects_are_reported_not_fatal() {
        let mut tree: BoundsTree<u32, 4> = BoundsTree::new();
        assert_eq!(tree.remove_at(&NodeStack::default()).unwrap_err(), InvariantViolation::EmptyTree);
        tree.add(1, cube(0.0));
        assert_eq!(tree.remove(2, &cube(0.0)).unwrap_err(), InvariantViolation::ObjectNotInTree);
        assert_eq!(tree.group_members(1, &cube(0.0)).unwrap_err(), InvariantViolation::NotInGroup);
        tree.add_single_group(2, cube(3.0));
        assert_eq!(tree.merge_groups(1, &cube(0.0), 2, &cube(3.0)).unwrap_err(), InvariantViolation::NotInGroup);
        assert_eq!(tree.len(), 2);
        tree.validate().unwrap();
    }
}
