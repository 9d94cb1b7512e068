// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural mirror of one tree layer.
//!
//! The index holds a slot per reachable node with its parent and ordered
//! children, plus lazily computed derived values (ancestor chain,
//! descendant list, height). Derived values are dropped through the
//! [`dirty`](crate::dirty) channels whenever the shape around a node
//! changes, and recomputed on the next query.
//!
//! Each slot also owns the shared [`HandleState`] cell that every
//! [`TreeHandle`](super::TreeHandle) for the node observes. Removing a node
//! from the index flips that cell to [`HandleState::Stale`] for good.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;

use hashbrown::HashMap;
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::dirty;
use crate::node::NodeId;

/// Lifecycle of a tree handle. `Stale` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// The node is part of its tree.
    Live,
    /// The node was deleted or its tree re-initialized.
    Stale,
}

#[derive(Debug)]
struct Slot {
    id: NodeId,
    state: Rc<Cell<HandleState>>,
    parent: Option<u32>,
    children: Vec<u32>,
    // -- Derived (dropped by dirty drains) --
    ancestors: Option<Rc<[NodeId]>>,
    descendants: Option<Rc<[NodeId]>>,
    height: Option<usize>,
}

impl Slot {
    fn new(id: NodeId, state: Rc<Cell<HandleState>>) -> Self {
        Self {
            id,
            state,
            parent: None,
            children: Vec::new(),
            ancestors: None,
            descendants: None,
            height: None,
        }
    }
}

/// Parent/child adjacency and derived structural queries for one layer.
#[derive(Debug)]
pub(crate) struct TreeIndex {
    root: Option<u32>,
    slots: Vec<Option<Slot>>,
    free_list: Vec<u32>,
    proxies: HashMap<NodeId, u32>,
    dirty: DirtyTracker<u32>,
}

impl Default for TreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeIndex {
    pub(crate) fn new() -> Self {
        Self {
            root: None,
            slots: Vec::new(),
            free_list: Vec::new(),
            proxies: HashMap::new(),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    // -- Lookup --

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root.map(|r| self.slot(r).id)
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.proxies.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Returns the shared handle state for `id`.
    pub(crate) fn state(&self, id: NodeId) -> Option<Rc<Cell<HandleState>>> {
        let idx = *self.proxies.get(&id)?;
        Some(Rc::clone(&self.slot(idx).state))
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        let idx = *self.proxies.get(&id)?;
        self.slot(idx).parent.map(|p| self.slot(p).id)
    }

    pub(crate) fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.proxies.get(&id).map_or_else(Vec::new, |&idx| {
            self.slot(idx)
                .children
                .iter()
                .map(|&c| self.slot(c).id)
                .collect()
        })
    }

    /// Returns `(position among siblings, sibling count)`. A root is the
    /// only child of nothing: `(0, 1)`.
    pub(crate) fn position(&self, id: NodeId) -> Option<(usize, usize)> {
        let idx = *self.proxies.get(&id)?;
        let Some(parent) = self.slot(idx).parent else {
            return Some((0, 1));
        };
        let siblings = &self.slot(parent).children;
        let pos = siblings.iter().position(|&c| c == idx)?;
        Some((pos, siblings.len()))
    }

    /// Returns `true` if `ancestor` lies strictly above `id`.
    pub(crate) fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let (Some(&a), Some(&idx)) = (self.proxies.get(&ancestor), self.proxies.get(&id)) else {
            return false;
        };
        let mut cursor = self.slot(idx).parent;
        while let Some(p) = cursor {
            if p == a {
                return true;
            }
            cursor = self.slot(p).parent;
        }
        false
    }

    // -- Derived queries --

    /// Ancestors of `id`, nearest first; the root is last.
    pub(crate) fn ancestors(&mut self, id: NodeId) -> Rc<[NodeId]> {
        self.flush();
        let Some(&idx) = self.proxies.get(&id) else {
            return Rc::from([]);
        };
        self.ancestors_at(idx)
    }

    /// All nodes strictly below `id`, in pre-order.
    pub(crate) fn descendants(&mut self, id: NodeId) -> Rc<[NodeId]> {
        self.flush();
        let Some(&idx) = self.proxies.get(&id) else {
            return Rc::from([]);
        };
        self.descendants_at(idx)
    }

    /// Longest downward path from `id` to a leaf; 0 for leaves.
    pub(crate) fn height(&mut self, id: NodeId) -> usize {
        self.flush();
        self.proxies
            .get(&id)
            .copied()
            .map_or(0, |idx| self.height_at(idx))
    }

    fn ancestors_at(&mut self, idx: u32) -> Rc<[NodeId]> {
        if let Some(cached) = &self.slot(idx).ancestors {
            return Rc::clone(cached);
        }
        let list: Rc<[NodeId]> = match self.slot(idx).parent {
            None => Rc::from([]),
            Some(p) => {
                let above = self.ancestors_at(p);
                let mut list = Vec::with_capacity(above.len() + 1);
                list.push(self.slot(p).id);
                list.extend_from_slice(&above);
                list.into()
            }
        };
        self.slot_mut(idx).ancestors = Some(Rc::clone(&list));
        list
    }

    fn descendants_at(&mut self, idx: u32) -> Rc<[NodeId]> {
        if let Some(cached) = &self.slot(idx).descendants {
            return Rc::clone(cached);
        }
        let mut list = Vec::new();
        for child in self.slot(idx).children.clone() {
            list.push(self.slot(child).id);
            list.extend_from_slice(&self.descendants_at(child));
        }
        let list: Rc<[NodeId]> = list.into();
        self.slot_mut(idx).descendants = Some(Rc::clone(&list));
        list
    }

    fn height_at(&mut self, idx: u32) -> usize {
        if let Some(h) = self.slot(idx).height {
            return h;
        }
        let mut height = 0;
        for child in self.slot(idx).children.clone() {
            height = height.max(self.height_at(child) + 1);
        }
        self.slot_mut(idx).height = Some(height);
        height
    }

    /// Drains both channels and drops the derived values of every node
    /// they report.
    fn flush(&mut self) {
        let subtree: Vec<u32> = self
            .dirty
            .drain(dirty::SUBTREE)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in subtree {
            if let Some(Some(slot)) = self.slots.get_mut(idx as usize) {
                slot.descendants = None;
                slot.height = None;
            }
        }

        let ancestry: Vec<u32> = self
            .dirty
            .drain(dirty::ANCESTRY)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in ancestry {
            if let Some(Some(slot)) = self.slots.get_mut(idx as usize) {
                slot.ancestors = None;
            }
        }
    }

    // -- Mutation --

    /// Marks every handle stale and forgets every node.
    pub(crate) fn dispose(&mut self) {
        for slot in self.slots.iter().flatten() {
            slot.state.set(HandleState::Stale);
        }
        self.root = None;
        self.slots.clear();
        self.free_list.clear();
        self.proxies.clear();
        self.dirty = DirtyTracker::with_cycle_handling(CycleHandling::Error);
    }

    /// Replaces the whole index with the shape in `walk`, a list of
    /// `(id, children)` whose first entry is the root.
    ///
    /// Nodes that were already indexed keep their handle state; nodes that
    /// are no longer reachable go stale.
    pub(crate) fn rebuild(&mut self, walk: &[(NodeId, Vec<NodeId>)]) {
        let mut previous: HashMap<NodeId, Rc<Cell<HandleState>>> = HashMap::new();
        for slot in self.slots.drain(..).flatten() {
            previous.insert(slot.id, slot.state);
        }
        self.root = None;
        self.free_list.clear();
        self.proxies.clear();
        self.dirty = DirtyTracker::with_cycle_handling(CycleHandling::Error);

        for (id, _) in walk {
            let state = previous
                .remove(id)
                .unwrap_or_else(|| Rc::new(Cell::new(HandleState::Live)));
            self.alloc(*id, state);
        }
        for (id, children) in walk {
            let p = self.proxies[id];
            for child in children {
                if let Some(&c) = self.proxies.get(child) {
                    self.link(p, c, None);
                }
            }
        }
        self.root = walk.first().map(|(id, _)| self.proxies[id]);

        for state in previous.values() {
            state.set(HandleState::Stale);
        }
    }

    /// Makes `id` the sole node of the index.
    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.dispose();
        let idx = self.alloc(id, Rc::new(Cell::new(HandleState::Live)));
        self.root = Some(idx);
    }

    /// Indexes a new leaf `id` under `parent` at child position `pos`.
    pub(crate) fn attach(&mut self, id: NodeId, parent: NodeId, pos: usize) {
        let Some(&p) = self.proxies.get(&parent) else {
            debug_assert!(false, "attach under unindexed parent {parent:?}");
            return;
        };
        let c = self.alloc(id, Rc::new(Cell::new(HandleState::Live)));
        self.link(p, c, Some(pos));
        self.dirty.mark_with(p, dirty::SUBTREE, &EagerPolicy);
    }

    /// Removes `id` and everything below it. Returns the removed ids, each
    /// exactly once, children before parents.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.proxies.get(&id) else {
            return Vec::new();
        };
        if let Some(p) = self.slot(idx).parent {
            self.dirty.mark_with(p, dirty::SUBTREE, &EagerPolicy);
            self.unlink(idx);
        }
        if self.root == Some(idx) {
            self.root = None;
        }

        // Pre-order collection, reversed into children-first order.
        let mut order = Vec::new();
        let mut stack = alloc::vec![idx];
        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.slot(next).children.iter().rev().copied());
        }

        let mut removed = Vec::with_capacity(order.len());
        for idx in order.into_iter().rev() {
            if let Some(slot) = self.slots[idx as usize].take() {
                slot.state.set(HandleState::Stale);
                self.proxies.remove(&slot.id);
                self.dirty.remove_key(idx);
                self.free_list.push(idx);
                removed.push(slot.id);
            }
        }
        removed
    }

    /// Moves `id` to the end of `new_parent`'s children.
    pub(crate) fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        let (Some(&c), Some(&p)) = (self.proxies.get(&id), self.proxies.get(&new_parent)) else {
            debug_assert!(false, "reparent of unindexed nodes");
            return;
        };
        if let Some(old) = self.slot(c).parent {
            self.dirty.mark_with(old, dirty::SUBTREE, &EagerPolicy);
            self.unlink(c);
        }
        self.link(p, c, None);
        self.dirty.mark_with(p, dirty::SUBTREE, &EagerPolicy);
        self.dirty.mark_with(c, dirty::ANCESTRY, &EagerPolicy);
    }

    /// Moves `id` to position `pos` among its siblings.
    pub(crate) fn reorder(&mut self, id: NodeId, pos: usize) {
        let Some(&c) = self.proxies.get(&id) else {
            return;
        };
        let Some(p) = self.slot(c).parent else {
            return;
        };
        let siblings = &mut self.slot_mut(p).children;
        siblings.retain(|&s| s != c);
        let pos = pos.min(siblings.len());
        siblings.insert(pos, c);
        // Pre-order descendant lists of the parent chain changed order.
        self.dirty.mark_with(p, dirty::SUBTREE, &EagerPolicy);
    }

    // -- Internal helpers --

    fn alloc(&mut self, id: NodeId, state: Rc<Cell<HandleState>>) -> u32 {
        let slot = Slot::new(id, state);
        let idx = if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(slot);
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            assert!(idx != u32::MAX, "tree index exhausted");
            self.slots.push(Some(slot));
            idx
        };
        self.proxies.insert(id, idx);
        idx
    }

    /// Links `c` under `p` at `pos` (or last) and adds the dirty edges.
    fn link(&mut self, p: u32, c: u32, pos: Option<usize>) {
        let children = &mut self.slot_mut(p).children;
        let pos = pos.unwrap_or(children.len()).min(children.len());
        children.insert(pos, c);
        self.slot_mut(c).parent = Some(p);

        // Parent depends on child for SUBTREE; child on parent for ANCESTRY.
        let _ = self.dirty.add_dependency(p, c, dirty::SUBTREE);
        let _ = self.dirty.add_dependency(c, p, dirty::ANCESTRY);
    }

    /// Removes `c` from its parent's child list and drops the dirty edges.
    fn unlink(&mut self, c: u32) {
        let Some(p) = self.slot_mut(c).parent.take() else {
            return;
        };
        self.slot_mut(p).children.retain(|&s| s != c);
        self.dirty.remove_dependency(p, c, dirty::SUBTREE);
        self.dirty.remove_dependency(c, p, dirty::ANCESTRY);
    }

    fn slot(&self, idx: u32) -> &Slot {
        self.slots[idx as usize]
            .as_ref()
            .unwrap_or_else(|| unreachable!("dangling index slot {idx}"))
    }

    fn slot_mut(&mut self, idx: u32) -> &mut Slot {
        self.slots[idx as usize]
            .as_mut()
            .unwrap_or_else(|| unreachable!("dangling index slot {idx}"))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::node::{Node, NodeStore};

    /// `root → [A → [A1, A2], B, C]`
    fn synthetic() -> (TreeIndex, [NodeId; 6]) {
        let mut store = NodeStore::new();
        let ids = ["root", "A", "A1", "A2", "B", "C"].map(|n| store.add(Node::new(n)));
        let [root, a, a1, a2, b, c] = ids;
        let walk = vec![
            (root, vec![a, b, c]),
            (a, vec![a1, a2]),
            (a1, vec![]),
            (a2, vec![]),
            (b, vec![]),
            (c, vec![]),
        ];
        let mut index = TreeIndex::new();
        index.rebuild(&walk);
        (index, ids)
    }

    #[test]
    fn structural_queries() {
        let (mut index, [root, a, a1, a2, b, c]) = synthetic();
        assert_eq!(index.root(), Some(root));
        assert_eq!(&*index.descendants(root), &[a, a1, a2, b, c]);
        assert_eq!(&*index.ancestors(a1), &[a, root], "nearest first");
        assert_eq!(index.height(root), 2);
        assert_eq!(index.height(b), 0);
        assert_eq!(index.position(c), Some((2, 3)));
        assert!(index.is_ancestor_of(root, a1));
        assert!(!index.is_ancestor_of(a1, root));
        assert!(!index.is_ancestor_of(a, a), "a node is not its own ancestor");
    }

    #[test]
    fn reparent_invalidates_both_directions() {
        let (mut index, [root, a, a1, _a2, b, _c]) = synthetic();
        // Warm the caches.
        assert_eq!(index.height(root), 2);
        assert_eq!(index.ancestors(a1).len(), 2);

        index.reparent(a, b);
        assert_eq!(&*index.ancestors(a1), &[a, b, root]);
        assert_eq!(index.height(root), 3, "root height follows the move");
        assert_eq!(index.parent(a), Some(b));
        assert_eq!(index.children(root).len(), 2);
    }

    #[test]
    fn remove_subtree_counts_each_node_once() {
        let (mut index, [root, a, a1, a2, _b, _c]) = synthetic();
        let state = index.state(a1).unwrap();
        let removed = index.remove_subtree(a);
        assert_eq!(removed, vec![a2, a1, a], "children before parents");
        assert_eq!(state.get(), HandleState::Stale);
        assert!(!index.contains(a1));
        assert_eq!(index.descendants(root).len(), 2);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn reorder_updates_preorder() {
        let (mut index, [root, a, a1, a2, b, c]) = synthetic();
        let _ = index.descendants(root);
        index.reorder(c, 0);
        assert_eq!(index.children(root), vec![c, a, b]);
        assert_eq!(&*index.descendants(root), &[c, a, a1, a2, b]);
    }

    #[test]
    fn rebuild_keeps_surviving_handles() {
        let (mut index, [root, a, a1, a2, b, c]) = synthetic();
        let kept = index.state(a).unwrap();
        let dropped = index.state(b).unwrap();
        index.rebuild(&[
            (root, vec![a, c]),
            (a, vec![a1, a2]),
            (a1, vec![]),
            (a2, vec![]),
            (c, vec![]),
        ]);
        assert!(Rc::ptr_eq(&kept, &index.state(a).unwrap()));
        assert_eq!(kept.get(), HandleState::Live);
        assert_eq!(dropped.get(), HandleState::Stale);
    }

    #[test]
    fn attach_marks_ancestors() {
        let (mut index, [root, a, ..]) = synthetic();
        let mut store = NodeStore::new();
        let deep = store.add(Node::new("deep"));
        assert_eq!(index.height(root), 2);
        let a1 = index.children(a)[0];
        index.attach(deep, a1, 0);
        assert_eq!(index.height(root), 3);
        assert_eq!(index.descendants(root).len(), 6);
    }
}
