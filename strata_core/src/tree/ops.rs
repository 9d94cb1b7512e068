// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural and field mutations on a tree layer.
//!
//! Every operation refreshes the layer, validates its arguments, and only
//! then writes. A successful write stamps a new revision on the layer and
//! marks its dependents dirty.

use alloc::string::ToString;
use alloc::vec::Vec;

use super::node_ref::Edit;
use super::{ChildIndex, Tree, TreeHandle};
use crate::error::{Error, Result};
use crate::node::{CHILDREN, Node, NodeId, NodeSpec};
use crate::trace::{StructureEvent, StructureKind, count_u32};
use crate::value::{Path, Value};

impl Tree {
    /// Creates a source tree from a nested literal.
    #[must_use]
    pub fn source_from(spec: &NodeSpec) -> Self {
        let tree = Self::source();
        tree.seed(spec);
        tree
    }

    /// Replaces the whole tree with a single root node.
    ///
    /// Handles to the previous nodes go stale. Any child ids on `root` are
    /// ignored. Fails with [`Error::InvalidMutation`] on a computed tree,
    /// whose shape always follows its upstream tree.
    pub fn init(&self, mut root: Node) -> Result<TreeHandle> {
        self.source_only("init")?;
        root.children.clear();
        self.inner.nodes.clear();
        let id = self.inner.nodes.add(root);
        self.inner.index.borrow_mut().set_root(id);
        self.touch();
        self.trace_structure(StructureKind::Init, id, 1);
        self.handle_at(id).ok_or(Error::NodeNotFound(id))
    }

    /// Replaces the whole tree with the nodes of `spec`.
    ///
    /// Ids are assigned bottom-up, so every child is created before its
    /// parent.
    pub fn init_from_tree(&self, spec: &NodeSpec) -> Result<TreeHandle> {
        self.source_only("init_from_tree")?;
        let id = self.seed(spec);
        self.handle_at(id).ok_or(Error::NodeNotFound(id))
    }

    fn seed(&self, spec: &NodeSpec) -> NodeId {
        fn build(tree: &Tree, spec: &NodeSpec, walk: &mut Vec<(NodeId, Vec<NodeId>)>) -> NodeId {
            let children: Vec<NodeId> = spec.children.iter().map(|c| build(tree, c, walk)).collect();
            let mut node = Node::from_fields(spec.fields.clone());
            node.children.clone_from(&children);
            let id = tree.inner.nodes.add(node);
            walk.push((id, children));
            id
        }

        self.inner.nodes.clear();
        let mut walk = Vec::with_capacity(spec.size());
        let root = build(self, spec, &mut walk);
        // Post-order reversed puts the root first.
        walk.reverse();
        {
            let mut index = self.inner.index.borrow_mut();
            index.dispose();
            index.rebuild(&walk);
        }
        self.touch();
        self.trace_structure(StructureKind::Init, root, spec.size());
        root
    }

    /// Inserts `node` as a child of `parent` and returns the new handle.
    ///
    /// Child ids on `node` are ignored; attach children with further calls.
    pub fn add_child(&self, parent: NodeId, mut node: Node, at: ChildIndex) -> Result<TreeHandle> {
        self.refresh()?;
        self.require(parent)?;

        let mut siblings = self.inner.index.borrow().children(parent);
        let pos = at.resolve(siblings.len());
        node.children.clear();
        let id = self.inner.nodes.add(node);
        siblings.insert(pos, id);
        if let Err(err) = self.edit(parent, Edit::Children(siblings)) {
            self.inner.nodes.remove(id);
            return Err(err);
        }
        self.inner.index.borrow_mut().attach(id, parent, pos);

        self.touch();
        self.trace_structure(StructureKind::Add, id, 1);
        self.handle_at(id).ok_or(Error::NodeNotFound(id))
    }

    /// Deletes `id` and its whole subtree. Returns the number of nodes
    /// removed.
    ///
    /// Deleting the root leaves the tree without one.
    pub fn delete_element(&self, id: NodeId) -> Result<usize> {
        self.refresh()?;
        self.require(id)?;

        let parent = self.inner.index.borrow().parent(id);
        if let Some(parent) = parent {
            let mut siblings = self.inner.index.borrow().children(parent);
            siblings.retain(|&s| s != id);
            self.edit(parent, Edit::Children(siblings))?;
        }
        let removed = self.inner.index.borrow_mut().remove_subtree(id);
        for &gone in &removed {
            self.inner.nodes.remove(gone);
        }

        self.touch();
        self.trace_structure(StructureKind::Delete, id, removed.len());
        Ok(removed.len())
    }

    /// Moves `id` to the end of `new_parent`'s children.
    ///
    /// Fails with [`Error::InvalidMutation`] if `new_parent` is `id` itself
    /// or lies below it.
    pub fn move_to(&self, id: NodeId, new_parent: NodeId) -> Result<()> {
        self.refresh()?;
        self.require(id)?;
        self.require(new_parent)?;
        {
            let index = self.inner.index.borrow();
            if id == new_parent || index.is_ancestor_of(id, new_parent) {
                return Err(Error::InvalidMutation(
                    "a node cannot move below itself".to_string(),
                ));
            }
        }

        let old_parent = self.inner.index.borrow().parent(id);
        if let Some(old) = old_parent
            && old != new_parent
        {
            let mut siblings = self.inner.index.borrow().children(old);
            siblings.retain(|&s| s != id);
            self.edit(old, Edit::Children(siblings))?;
        }
        let mut siblings = self.inner.index.borrow().children(new_parent);
        siblings.retain(|&s| s != id);
        siblings.push(id);
        self.edit(new_parent, Edit::Children(siblings))?;
        self.inner.index.borrow_mut().reparent(id, new_parent);

        self.touch();
        self.trace_structure(StructureKind::Move, id, 1);
        Ok(())
    }

    /// Moves `id` to position `pos` among its siblings.
    ///
    /// `pos` is clamped into `0..=max_pos`. Roots, and nodes already at the
    /// target position, are left alone.
    pub fn move_pos(&self, id: NodeId, pos: i64) -> Result<()> {
        self.refresh()?;
        self.require(id)?;

        let Some(parent) = self.inner.index.borrow().parent(id) else {
            return Ok(());
        };
        let mut siblings = self.inner.index.borrow().children(parent);
        let Some(current) = siblings.iter().position(|&s| s == id) else {
            return Ok(());
        };
        let max = siblings.len() - 1;
        let target = usize::try_from(pos.max(0)).unwrap_or(usize::MAX).min(max);
        if target == current {
            return Ok(());
        }

        siblings.remove(current);
        siblings.insert(target, id);
        self.edit(parent, Edit::Children(siblings))?;
        self.inner.index.borrow_mut().reorder(id, target);

        self.touch();
        self.trace_structure(StructureKind::Reorder, id, 1);
        Ok(())
    }

    /// Writes `value` at `path` of node `id`.
    ///
    /// The child list is not a field: a path starting with `children` fails
    /// with [`Error::DirectInternalAccess`]. On a computed tree the write is
    /// an overlay change and is discarded by the next recompute pass unless
    /// the recompute function makes it again.
    pub fn set(&self, id: NodeId, path: impl Into<Path>, value: impl Into<Value>) -> Result<()> {
        let path = path.into();
        let value = value.into();
        if path.head() == CHILDREN {
            return Err(Error::DirectInternalAccess(CHILDREN.to_string()));
        }
        self.refresh()?;
        self.require(id)?;

        let unchanged = self.with_node(id, |node, _| node.field(&path) == Some(&value))?;
        if unchanged == Some(true) {
            return Ok(());
        }
        self.edit(id, Edit::Field(&path, value))?;
        self.touch();
        Ok(())
    }

    /// Replaces every field of node `id` with the fields of `node`.
    ///
    /// The child list of `id` is kept; child ids on `node` are ignored.
    pub fn replace(&self, id: NodeId, node: &Node) -> Result<()> {
        self.refresh()?;
        self.require(id)?;
        self.edit(id, Edit::Replace(node))?;
        self.touch();
        Ok(())
    }

    // -- Helpers --

    fn edit(&self, id: NodeId, edit: Edit<'_>) -> Result<()> {
        self.with_tracer(|tracer| self.inner.nodes.edit(id, edit, tracer))
    }

    fn source_only(&self, op: &str) -> Result<()> {
        if self.is_computed() {
            Err(Error::InvalidMutation(alloc::format!(
                "`{op}` on a computed tree"
            )))
        } else {
            Ok(())
        }
    }

    fn trace_structure(&self, kind: StructureKind, id: NodeId, count: usize) {
        let layer = self.layer_id().get();
        let at = self.revision();
        self.with_tracer(|t| {
            t.structure(&StructureEvent {
                layer,
                kind,
                node_index: id.index(),
                count: count_u32(count),
                at,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;

    use super::*;
    use crate::state::State;
    use crate::tree::HandleState;

    /// `root → [A → [A1, A2], B, C]`
    fn synthetic() -> (Tree, Vec<NodeId>) {
        let tree = Tree::source_from(&NodeSpec::new("root").with_children([
            NodeSpec::new("A").with_children([NodeSpec::new("A1"), NodeSpec::new("A2")]),
            NodeSpec::new("B"),
            NodeSpec::new("C"),
        ]));
        let root = tree.root().unwrap();
        let mut ids = vec![root.id()];
        ids.extend(root.descendants().unwrap().ids());
        (tree, ids)
    }

    fn names(tree: &Tree, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                tree.node(id)
                    .unwrap()
                    .and_then(|n| n.name().map(String::from))
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn ids_are_assigned_bottom_up() {
        let (_, ids) = synthetic();
        let [root, a, a1, ..] = ids[..] else {
            panic!("six nodes");
        };
        assert!(a1.index() < a.index());
        assert!(a.index() < root.index());
    }

    #[test]
    fn add_child_clamps_and_splices() {
        let (tree, ids) = synthetic();
        let root = ids[0];
        let d = tree.add_child(root, Node::new("D"), ChildIndex::At(1)).unwrap();
        let e = tree.add_child(root, Node::new("E"), ChildIndex::At(99)).unwrap();
        let children = tree.root().unwrap().children().unwrap().ids();
        assert_eq!(names(&tree, &children), ["A", "D", "B", "C", "E"]);
        assert_eq!(d.pos().unwrap(), 1);
        assert_eq!(e.pos().unwrap(), 4);
        assert_eq!(
            tree.node(root).unwrap().unwrap().children(),
            &children[..],
            "node record and index agree"
        );
    }

    #[test]
    fn add_child_under_missing_parent() {
        let (tree, ids) = synthetic();
        let b = ids[4];
        tree.delete_element(b).unwrap();
        assert_eq!(
            tree.add_child(b, Node::new("x"), ChildIndex::Append).unwrap_err(),
            Error::NodeNotFound(b)
        );
        assert_eq!(tree.len().unwrap(), 5);
    }

    #[test]
    fn cascading_delete_counts_subtree() {
        let (tree, ids) = synthetic();
        let [root, a, a1, a2, ..] = ids[..] else {
            panic!("six nodes");
        };
        let handle = tree.get_element(a1).unwrap().unwrap();
        assert_eq!(tree.delete_element(a).unwrap(), 3);
        assert!(!tree.node(root).unwrap().unwrap().children().contains(&a));
        for gone in [a, a1, a2] {
            assert!(tree.node(gone).unwrap().is_none());
            assert!(tree.get_element(gone).unwrap().is_none());
        }
        assert_eq!(handle.state(), HandleState::Stale);
        assert_eq!(handle.name().unwrap_err(), Error::StaleHandle(a1));
    }

    #[test]
    fn deleting_the_root_empties_the_tree() {
        let (tree, ids) = synthetic();
        assert_eq!(tree.delete_element(ids[0]).unwrap(), 6);
        assert_eq!(tree.root().unwrap_err(), Error::RootNotSet);
    }

    #[test]
    fn move_to_appends_and_rejects_cycles() {
        let (tree, ids) = synthetic();
        let [root, a, a1, _, b, c] = ids[..] else {
            panic!("six nodes");
        };
        tree.move_to(a1, c).unwrap();
        assert_eq!(tree.get_element(a1).unwrap().unwrap().depth().unwrap(), 2);
        assert_eq!(tree.node(c).unwrap().unwrap().children(), &[a1]);
        assert_eq!(tree.node(a).unwrap().unwrap().children().len(), 1);

        assert!(matches!(tree.move_to(a, a), Err(Error::InvalidMutation(_))));
        assert!(matches!(tree.move_to(root, b), Err(Error::InvalidMutation(_))));

        tree.move_to(a, root).unwrap();
        let order = tree.root().unwrap().children().unwrap().ids();
        assert_eq!(names(&tree, &order), ["B", "C", "A"]);
    }

    #[test]
    fn move_pos_clamps() {
        let (tree, ids) = synthetic();
        let root = tree.root().unwrap();
        let c = ids[5];
        let before = root.descendants().unwrap().len();

        tree.move_pos(c, -5).unwrap();
        assert_eq!(tree.get_element(c).unwrap().unwrap().pos().unwrap(), 0);

        tree.move_pos(c, 50).unwrap();
        let handle = tree.get_element(c).unwrap().unwrap();
        assert_eq!(handle.pos().unwrap(), handle.max_pos().unwrap());

        tree.move_pos(c, 1).unwrap();
        let order = root.children().unwrap().ids();
        assert_eq!(names(&tree, &order), ["A", "C", "B"]);
        assert_eq!(root.descendants().unwrap().len(), before);
        assert_eq!(handle.ancestors().unwrap().len(), 1);

        let revision = tree.revision();
        tree.move_pos(ids[0], 3).unwrap();
        assert_eq!(tree.revision(), revision, "moving the root is a no-op");
    }

    #[test]
    fn set_rejects_children_and_skips_unchanged() {
        let (tree, ids) = synthetic();
        assert_eq!(
            tree.set(ids[0], "children", Value::Null).unwrap_err(),
            Error::DirectInternalAccess("children".into())
        );
        let revision = tree.revision();
        tree.set(ids[0], "name", "root").unwrap();
        assert_eq!(tree.revision(), revision);
        tree.set(ids[0], "meta.grade", "A").unwrap();
        assert!(tree.revision() > revision);
        assert_eq!(
            tree.root().unwrap().get("meta.grade").unwrap(),
            Some(Value::from("A"))
        );
    }

    #[test]
    fn replace_keeps_children() {
        let (tree, ids) = synthetic();
        let a = ids[1];
        tree.replace(a, &Node::new("A'").with_field("kind", "group"))
            .unwrap();
        let node = tree.node(a).unwrap().unwrap();
        assert_eq!(node.name(), Some("A'"));
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn computed_replace_drops_overlay_only_fields() {
        let (source, ids) = synthetic();
        let computed = Tree::computed(&source, State::new(), |_, _| Ok(()));
        let a = ids[1];
        computed.set(a, "extra", 1).unwrap();
        let node = computed.node(a).unwrap().unwrap();
        assert_eq!(node.field(&"extra".into()), Some(&Value::Int(1)));

        computed.replace(a, &Node::new("R")).unwrap();
        let node = computed.node(a).unwrap().unwrap();
        assert_eq!(node.name(), Some("R"));
        assert_eq!(node.field(&"extra".into()), None);
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn unchanged_computed_writes_leave_dependents_clean() {
        let (source, ids) = synthetic();
        let mid = Tree::computed(&source, State::new(), |_, _| Ok(()));
        let top = Tree::computed(&mid, State::new(), |_, _| Ok(()));
        top.root().unwrap();
        let passes = top.recompute_count();
        let revision = mid.revision();

        mid.set(ids[0], "name", "root").unwrap();
        assert_eq!(mid.revision(), revision);
        assert!(!top.needs_recompute());
        top.root().unwrap();
        assert_eq!(top.recompute_count(), passes);

        mid.set(ids[0], "name", "ROOT").unwrap();
        assert!(mid.revision() > revision);
        assert!(top.needs_recompute());
    }

    #[test]
    fn init_disposes_previous_nodes() {
        let (tree, ids) = synthetic();
        let old = tree.get_element(ids[2]).unwrap().unwrap();
        let root = tree.init(Node::new("fresh")).unwrap();
        assert!(old.is_stale());
        assert_eq!(tree.len().unwrap(), 1);
        assert!(root.children().unwrap().is_empty());
        assert!(tree.node(ids[0]).unwrap().is_none(), "old ids stay dead");
    }

    #[test]
    fn computed_layers_reject_init() {
        let (tree, _) = synthetic();
        let computed = Tree::computed(&tree, State::new(), |_, _| Ok(()));
        assert!(matches!(
            computed.init(Node::new("x")),
            Err(Error::InvalidMutation(_))
        ));
    }

    #[test]
    fn computed_structure_stays_in_its_layer() {
        let (source, ids) = synthetic();
        let computed = Tree::computed(&source, State::new(), |_, _| Ok(()));
        let [_, a, _, _, b, c] = ids[..] else {
            panic!("six nodes");
        };
        assert_eq!(computed.delete_element(a).unwrap(), 3);
        computed.move_pos(c, 0).unwrap();

        assert_eq!(computed.len().unwrap(), 3);
        assert_eq!(source.len().unwrap(), 6, "source untouched");
        assert_eq!(source.root().unwrap().children().unwrap().ids(), [a, b, c]);
        assert_eq!(computed.root().unwrap().children().unwrap().ids(), [c, b]);
    }
}
