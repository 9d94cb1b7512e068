// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot-arena node storage with generational ids.

use alloc::vec::Vec;

use super::id::{LayerId, NodeId};
use super::record::Node;
use crate::error::{Error, Result};
use crate::revision::Revision;

/// Canonical node records of one layer, keyed by [`NodeId`].
///
/// Nodes occupy slots in parallel arrays. Deleted nodes are recycled via a
/// free list, and generation counters prevent stale id access. This is the
/// only place identifiers are assigned. No tree-shape validation happens
/// here; that is the job of the tree index.
#[derive(Debug)]
pub struct NodeStore {
    layer: LayerId,
    slots: Vec<Option<Node>>,
    generation: Vec<u32>,
    revision: Vec<Revision>,
    free_list: Vec<u32>,
    live: usize,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    /// Creates an empty store with a fresh [`LayerId`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            layer: LayerId::next(),
            slots: Vec::new(),
            generation: Vec::new(),
            revision: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Returns the layer tag carried by every id this store mints.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Inserts a node and returns its new id.
    pub fn add(&mut self, node: Node) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            self.generation[idx as usize] += 1;
            self.slots[idx as usize] = Some(node);
            self.revision[idx as usize] = Revision::next();
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            assert!(idx != u32::MAX, "node store exhausted");
            self.slots.push(Some(node));
            self.generation.push(0);
            self.revision.push(Revision::next());
            idx
        };
        self.live += 1;
        NodeId {
            layer: self.layer,
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Returns the node for `id`, if it is alive.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !self.is_current(id) {
            return None;
        }
        self.slots[id.idx as usize].as_ref()
    }

    /// Mutates the node for `id` in place and stamps a new revision.
    pub fn update<R>(&mut self, id: NodeId, f: impl FnOnce(&mut Node) -> R) -> Result<R> {
        if !self.is_current(id) {
            return Err(Error::NodeNotFound(id));
        }
        let node = self.slots[id.idx as usize]
            .as_mut()
            .ok_or(Error::NodeNotFound(id))?;
        let out = f(node);
        self.revision[id.idx as usize] = Revision::next();
        Ok(out)
    }

    /// Replaces the record for `id` wholesale.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Result<Node> {
        self.update(id, |slot| core::mem::replace(slot, node))
    }

    /// Deletes `id`, returning its record.
    pub fn delete(&mut self, id: NodeId) -> Option<Node> {
        if !self.is_current(id) {
            return None;
        }
        let node = self.slots[id.idx as usize].take()?;
        self.free_list.push(id.idx);
        self.live -= 1;
        Some(node)
    }

    /// Returns whether `id` refers to a live node.
    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the revision stamped by the last write to `id`.
    #[must_use]
    pub fn revision(&self, id: NodeId) -> Option<Revision> {
        self.exists(id).then(|| self.revision[id.idx as usize])
    }

    /// Returns the ids of all live nodes, in slot order.
    pub fn all_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref()?;
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slot count is bounded by u32 in `add`"
            )]
            let idx = idx as u32;
            Some(NodeId {
                layer: self.layer,
                idx,
                generation: self.generation[idx as usize],
            })
        })
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the store holds no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Deletes every node. Ids handed out before stay dead.
    pub fn clear(&mut self) {
        for idx in 0..self.slots.len() {
            if self.slots[idx].take().is_some() {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "slot count is bounded by u32 in `add`"
                )]
                self.free_list.push(idx as u32);
            }
        }
        self.live = 0;
    }

    fn is_current(&self, id: NodeId) -> bool {
        id.layer == self.layer
            && (id.idx as usize) < self.slots.len()
            && self.generation[id.idx as usize] == id.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_delete() {
        let mut store = NodeStore::new();
        let id = store.add(Node::new("a"));
        assert!(store.exists(id));
        assert_eq!(store.len(), 1);
        assert_eq!(store.delete(id).as_ref().and_then(Node::name), Some("a"));
        assert!(!store.exists(id));
        assert!(store.is_empty());
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = NodeStore::new();
        let id1 = store.add(Node::new("a"));
        store.delete(id1);
        let id2 = store.add(Node::new("b"));
        // id2 reuses the same slot but has a different generation.
        assert!(!store.exists(id1));
        assert!(store.exists(id2));
        assert_eq!(id1.index(), id2.index());
        assert_ne!(id1.generation(), id2.generation());
    }

    #[test]
    fn ids_from_other_stores_do_not_resolve() {
        let mut a = NodeStore::new();
        let b = NodeStore::new();
        let id = a.add(Node::new("a"));
        assert_ne!(a.layer(), b.layer());
        assert!(b.get(id).is_none(), "foreign id must not resolve");
    }

    #[test]
    fn update_bumps_revision() {
        let mut store = NodeStore::new();
        let id = store.add(Node::new("a"));
        let before = store.revision(id);
        store
            .update(id, |n| n.set_field(&"name".into(), "b".into()))
            .unwrap();
        assert!(store.revision(id) > before, "write must stamp a newer revision");
        assert_eq!(store.get(id).and_then(Node::name), Some("b"));
    }

    #[test]
    fn replace_missing_is_not_found() {
        let mut store = NodeStore::new();
        let id = store.add(Node::new("a"));
        store.delete(id);
        assert_eq!(
            store.replace(id, Node::new("b")),
            Err(Error::NodeNotFound(id))
        );
    }

    #[test]
    fn clear_keeps_old_ids_dead() {
        let mut store = NodeStore::new();
        let a = store.add(Node::new("a"));
        let b = store.add(Node::new("b"));
        store.clear();
        assert!(store.is_empty());
        let c = store.add(Node::new("c"));
        assert!(!store.exists(a) && !store.exists(b));
        assert!(store.exists(c));
        assert_eq!(store.all_ids().count(), 1);
    }
}
