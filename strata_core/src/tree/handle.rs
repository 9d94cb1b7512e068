// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The externally visible view of one node.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use super::{ChildIndex, HandleState, NodeList, Tree};
use crate::error::{Error, Result};
use crate::node::{Node, NodeId};
use crate::overlay::OverlayType;
use crate::value::{Path, Record, Value};

/// A handle to one node of a [`Tree`].
///
/// Every accessor refreshes the owning tree first, so a handle into a
/// computed tree always observes the current pass. Once the node is deleted
/// the handle is [`HandleState::Stale`] for good and every accessor except
/// [`id`](Self::id), [`state`](Self::state), and [`snapshot`](Self::snapshot)
/// fails with [`Error::StaleHandle`].
#[derive(Clone)]
pub struct TreeHandle {
    id: NodeId,
    state: Rc<Cell<HandleState>>,
    tree: Tree,
}

impl fmt::Debug for TreeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeHandle")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl PartialEq for TreeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tree.ptr_eq(&other.tree)
    }
}

impl Eq for TreeHandle {}

impl TreeHandle {
    pub(crate) fn new(id: NodeId, state: Rc<Cell<HandleState>>, tree: Tree) -> Self {
        Self { id, state, tree }
    }

    /// Returns the node id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the tree this handle belongs to.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Returns the lifecycle state, after bringing the tree up to date.
    ///
    /// A failing refresh leaves the state as of the last pass; the failure
    /// is traced as an invalidation with cause `Failed`. Use
    /// [`try_state`](Self::try_state) to observe it.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.try_state().unwrap_or_else(|_| self.state.get())
    }

    /// Returns the lifecycle state, or the error of a failing refresh.
    pub fn try_state(&self) -> Result<HandleState> {
        self.tree.refresh()?;
        Ok(self.state.get())
    }

    /// Returns `true` once the node has left its tree.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.state() == HandleState::Stale
    }

    fn live(&self) -> Result<()> {
        self.tree.refresh()?;
        match self.state.get() {
            HandleState::Live => Ok(()),
            HandleState::Stale => Err(Error::StaleHandle(self.id)),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        self.live()?;
        self.tree
            .with_node(self.id, |node, _| f(node))?
            .ok_or(Error::NodeNotFound(self.id))
    }

    fn list(&self, ids: Vec<NodeId>) -> NodeList {
        NodeList::new(self.tree.clone(), ids)
    }

    // -- Fields --

    /// Returns the `name` field, if it is text.
    pub fn name(&self) -> Result<Option<String>> {
        self.read(|node| node.name().map(String::from))
    }

    /// Returns a copy of the value at `path`.
    pub fn get(&self, path: impl Into<Path>) -> Result<Option<Value>> {
        let path = path.into();
        self.read(|node| node.field(&path).cloned())
    }

    /// Returns an owned copy of the node.
    pub fn node(&self) -> Result<Node> {
        self.read(Node::copy)
    }

    /// Writes `value` at `path`. See [`Tree::set`].
    pub fn set(&self, path: impl Into<Path>, value: impl Into<Value>) -> Result<()> {
        self.live()?;
        self.tree.set(self.id, path, value)
    }

    /// Replaces every field. See [`Tree::replace`].
    pub fn replace(&self, node: &Node) -> Result<()> {
        self.live()?;
        self.tree.replace(self.id, node)
    }

    // -- Structure --

    /// Returns the parent, or `None` for the root.
    pub fn parent(&self) -> Result<Option<Self>> {
        self.live()?;
        let parent = self.tree.inner.index.borrow().parent(self.id);
        Ok(parent.and_then(|p| self.tree.handle_at(p)))
    }

    /// Returns the children, in order.
    pub fn children(&self) -> Result<NodeList> {
        self.live()?;
        let ids = self.tree.inner.index.borrow().children(self.id);
        Ok(self.list(ids))
    }

    /// Returns the ancestors, nearest first; the root is last.
    pub fn ancestors(&self) -> Result<NodeList> {
        self.live()?;
        let ids = self.tree.inner.index.borrow_mut().ancestors(self.id);
        Ok(self.list(ids.to_vec()))
    }

    /// Returns every node strictly below this one, in pre-order.
    pub fn descendants(&self) -> Result<NodeList> {
        self.live()?;
        let ids = self.tree.inner.index.borrow_mut().descendants(self.id);
        Ok(self.list(ids.to_vec()))
    }

    /// Returns the descendants that have no children.
    pub fn leafs(&self) -> Result<NodeList> {
        self.live()?;
        let mut index = self.tree.inner.index.borrow_mut();
        let leafs = index
            .descendants(self.id)
            .iter()
            .copied()
            .filter(|&id| index.children(id).is_empty())
            .collect();
        drop(index);
        Ok(self.list(leafs))
    }

    /// Returns the position among siblings; 0 for the root.
    pub fn pos(&self) -> Result<usize> {
        Ok(self.position()?.0)
    }

    /// Returns the largest valid position among siblings.
    pub fn max_pos(&self) -> Result<usize> {
        Ok(self.position()?.1.saturating_sub(1))
    }

    fn position(&self) -> Result<(usize, usize)> {
        self.live()?;
        let position = self.tree.inner.index.borrow().position(self.id);
        position.ok_or(Error::NodeNotFound(self.id))
    }

    /// Returns the number of ancestors.
    pub fn depth(&self) -> Result<usize> {
        Ok(self.ancestors()?.len())
    }

    /// Returns the longest downward path to a leaf; 0 for leaves.
    pub fn height(&self) -> Result<usize> {
        self.live()?;
        Ok(self.tree.inner.index.borrow_mut().height(self.id))
    }

    /// Returns `true` if the node has no children.
    pub fn is_leaf(&self) -> Result<bool> {
        Ok(self.children()?.is_empty())
    }

    /// Returns `true` if `id` lies strictly below this node.
    pub fn is_ancestor_of(&self, id: NodeId) -> Result<bool> {
        self.live()?;
        Ok(self.tree.inner.index.borrow().is_ancestor_of(self.id, id))
    }

    /// Returns `true` if `id` lies strictly above this node.
    pub fn is_descendant_of(&self, id: NodeId) -> Result<bool> {
        self.live()?;
        Ok(self.tree.inner.index.borrow().is_ancestor_of(id, self.id))
    }

    // -- Structural mutation --

    /// Adds a child. See [`Tree::add_child`].
    pub fn add_child(&self, node: Node, at: ChildIndex) -> Result<Self> {
        self.live()?;
        self.tree.add_child(self.id, node, at)
    }

    /// Deletes this node and its subtree. See [`Tree::delete_element`].
    pub fn delete(&self) -> Result<usize> {
        self.live()?;
        self.tree.delete_element(self.id)
    }

    /// Moves this node under `parent`. See [`Tree::move_to`].
    pub fn set_parent(&self, parent: NodeId) -> Result<()> {
        self.live()?;
        self.tree.move_to(self.id, parent)
    }

    /// Moves this node among its siblings. See [`Tree::move_pos`].
    pub fn move_pos(&self, pos: i64) -> Result<()> {
        self.live()?;
        self.tree.move_pos(self.id, pos)
    }

    // -- Provenance --

    /// Returns `true` if the node differs from its upstream counterpart.
    /// Always `false` in a source tree.
    pub fn is_dirty(&self) -> Result<bool> {
        self.live()?;
        Ok(self.tree.inner.nodes.is_dirty(self.id))
    }

    /// Returns `true` if the value at `path` differs from upstream.
    pub fn is_property_dirty(&self, path: impl Into<Path>) -> Result<bool> {
        self.live()?;
        Ok(self.tree.inner.nodes.is_property_dirty(self.id, &path.into()))
    }

    /// Returns where the resolved node comes from.
    pub fn overlay_type(&self) -> Result<OverlayType> {
        self.live()?;
        Ok(self.tree.inner.nodes.overlay_type(self.id))
    }

    /// Returns the node as the backing source holds it, bypassing this
    /// layer's changes. `None` for nodes added in this layer.
    pub fn previous(&self) -> Result<Option<Node>> {
        self.live()?;
        self.tree.inner.nodes.with_previous(self.id, Node::copy)
    }

    // -- Serialization --

    /// Captures `{id, name, children}` for this node and its subtree.
    ///
    /// Works on stale handles, which yield [`Snapshot::Stale`].
    pub fn snapshot(&self) -> Result<Snapshot> {
        if self.is_stale() {
            return Ok(Snapshot::Stale { id: self.id });
        }
        self.live()?;
        snapshot_of(&self.tree, self.id)
    }
}

fn snapshot_of(tree: &Tree, id: NodeId) -> Result<Snapshot> {
    let name = tree
        .with_node(id, |node, _| node.name().map(String::from))?
        .ok_or(Error::NodeNotFound(id))?;
    let child_ids = tree.inner.index.borrow().children(id);
    let children = child_ids
        .into_iter()
        .map(|child| snapshot_of(tree, child))
        .collect::<Result<_>>()?;
    Ok(Snapshot::Node { id, name, children })
}

/// A serializable capture of a subtree.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    /// A live node.
    Node {
        /// Node id.
        id: NodeId,
        /// The `name` field, if it is text.
        name: Option<String>,
        /// Child snapshots, in order.
        children: Vec<Snapshot>,
    },
    /// A handle whose node is gone.
    Stale {
        /// Id the handle referred to.
        id: NodeId,
    },
}

impl Snapshot {
    /// Returns the captured id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Node { id, .. } | Self::Stale { id } => *id,
        }
    }

    /// Converts to a [`Value`] map: `{id, name, children}` with `children`
    /// omitted when empty, or `{id, stale: true}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut record = Record::new();
        match self {
            Self::Node { id, name, children } => {
                record.insert("id".into(), Value::Text(id.to_string()));
                record.insert(
                    "name".into(),
                    name.clone().map_or(Value::Null, Value::Text),
                );
                if !children.is_empty() {
                    let children = children.iter().map(Self::to_value).collect();
                    record.insert("children".into(), Value::List(children));
                }
            }
            Self::Stale { id } => {
                record.insert("id".into(), Value::Text(id.to_string()));
                record.insert("stale".into(), Value::Bool(true));
            }
        }
        Value::Map(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;
    use crate::state::State;

    fn small() -> Tree {
        Tree::source_from(
            &NodeSpec::new("root").with_children([NodeSpec::new("a").child(NodeSpec::new("a1"))]),
        )
    }

    #[test]
    fn snapshot_omits_empty_children() {
        let tree = small();
        let snapshot = tree.root().unwrap().snapshot().unwrap();
        let Value::Map(root) = snapshot.to_value() else {
            panic!("snapshot is a map");
        };
        assert_eq!(root["name"], Value::from("root"));
        let Value::List(children) = &root["children"] else {
            panic!("root has children");
        };
        let Value::List(leaf) = &children[0].as_map().unwrap()["children"] else {
            panic!("a has children");
        };
        assert!(
            !leaf[0].as_map().unwrap().contains_key("children"),
            "leaf omits children"
        );
    }

    #[test]
    fn stale_handles_only_serialize() {
        let tree = small();
        let a = tree.root().unwrap().children().unwrap().get(0).unwrap();
        let id = a.id();
        a.delete().unwrap();

        assert!(a.is_stale());
        assert_eq!(a.snapshot().unwrap(), Snapshot::Stale { id });
        assert_eq!(a.get("name").unwrap_err(), Error::StaleHandle(id));
        assert_eq!(a.parent().unwrap_err(), Error::StaleHandle(id));
        assert_eq!(a.set("x", 1).unwrap_err(), Error::StaleHandle(id));
        let value = a.snapshot().unwrap().to_value();
        assert_eq!(value.as_map().unwrap()["stale"], Value::Bool(true));
    }

    #[test]
    fn failed_refresh_surfaces_through_try_state() {
        let source = small();
        let state = State::new();
        let computed = Tree::computed(&source, state.clone(), |s, _| {
            if s.get("fail") == Some(Value::Bool(true)) {
                Err(Error::InvalidMutation("refused".into()))
            } else {
                Ok(())
            }
        });
        let root = computed.root().unwrap();
        state.set("fail", true);

        assert_eq!(
            root.try_state().unwrap_err(),
            Error::InvalidMutation("refused".into())
        );
        assert_eq!(root.state(), HandleState::Live);
        assert!(!root.is_stale());

        state.set("fail", false);
        assert_eq!(root.try_state().unwrap(), HandleState::Live);
    }

    #[test]
    fn leafs_and_positions() {
        let tree = small();
        let root = tree.root().unwrap();
        let leafs = root.leafs().unwrap();
        assert_eq!(leafs.len(), 1);
        assert_eq!(leafs.get(0).unwrap().name().unwrap().as_deref(), Some("a1"));
        assert!(leafs.get(0).unwrap().is_leaf().unwrap());
        assert!(!root.is_leaf().unwrap());
        assert_eq!(root.pos().unwrap(), 0);
        assert_eq!(root.max_pos().unwrap(), 0);
        assert_eq!(root.parent().unwrap(), None);
    }

    #[test]
    fn added_nodes_report_added() {
        let source = small();
        let computed = Tree::computed(&source, State::new(), |_, root| {
            root.add_child(Node::new("extra"), ChildIndex::At(0))?;
            Ok(())
        });
        let extra = computed.root().unwrap().children().unwrap().get(0).unwrap();
        assert_eq!(extra.overlay_type().unwrap(), OverlayType::Added);
        assert!(extra.is_dirty().unwrap());
        assert!(extra.is_property_dirty("name").unwrap());
        assert_eq!(extra.previous().unwrap(), None);

        let root = computed.root().unwrap();
        assert_eq!(root.overlay_type().unwrap(), OverlayType::Overwritten, "child list changed");
        assert!(!root.is_property_dirty("name").unwrap());
    }
}
