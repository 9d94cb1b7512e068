// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree layers: source trees and computed trees.
//!
//! A [`Tree`] is a cheaply clonable handle to one layer. A *source* tree owns
//! its nodes in a [`NodeStore`](crate::node::NodeStore). A *computed* tree
//! shadows an upstream tree through an [`OverlayStore`](crate::overlay::OverlayStore)
//! and is rebuilt by a recompute function whenever the upstream tree or the
//! [`State`](crate::state::State) paths it read have changed.
//!
//! Both kinds keep a structural index (parent links, ordered children,
//! derived ancestor/descendant/height values) and hand out [`TreeHandle`]s.
//!
//! ```text
//!  Tree::source() ──────► NodeStore ◄── TreeIndex ──► TreeHandle
//!        │
//!        │ dependents (Weak)            upstream (Rc)
//!        ▼                                  │
//!  Tree::computed(..) ──► OverlayStore ─────┘ ◄── TreeIndex ──► TreeHandle
//! ```
//!
//! Reads on a computed tree refresh it first; a read never observes an
//! out-of-date layer.

mod child_index;
mod handle;
mod index;
mod list;
mod node_ref;
mod ops;
mod recompute;

pub use child_index::ChildIndex;
pub use handle::{Snapshot, TreeHandle};
pub use index::HandleState;
pub use list::NodeList;
pub use recompute::ComputedConfig;

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use hashbrown::HashSet;

use crate::error::{Error, Result};
use crate::node::{LayerId, Node, NodeId};
use crate::revision::Revision;
use crate::trace::{TraceSink, Tracer};

use index::TreeIndex;
use node_ref::NodeRef;
use recompute::Compute;

struct TreeInner {
    nodes: NodeRef,
    index: RefCell<TreeIndex>,
    compute: Option<Compute>,
    /// Computed layers built on this one.
    dependents: RefCell<Vec<Weak<TreeInner>>>,
    /// Stamped on every change visible through this layer.
    revision: Cell<Revision>,
    sink: RefCell<Option<Box<dyn TraceSink>>>,
}

/// A handle to one tree layer.
///
/// Cloning a `Tree` yields another handle to the same layer.
#[derive(Clone)]
pub struct Tree {
    inner: Rc<TreeInner>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("layer", &self.layer_id())
            .field("computed", &self.is_computed())
            .field("revision", &self.revision())
            .field("nodes", &self.inner.index.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// Creates an empty source tree. Call [`init`](Self::init) or
    /// [`init_from_tree`](Self::init_from_tree) to give it a root.
    #[must_use]
    pub fn source() -> Self {
        Self::from_parts(NodeRef::source(), None)
    }

    fn from_parts(nodes: NodeRef, compute: Option<Compute>) -> Self {
        Self {
            inner: Rc::new(TreeInner {
                nodes,
                index: RefCell::new(TreeIndex::new()),
                compute,
                dependents: RefCell::new(Vec::new()),
                revision: Cell::new(Revision::next()),
                sink: RefCell::new(None),
            }),
        }
    }

    // -- Layer queries --

    /// Returns the layer tag of ids minted by this tree.
    #[must_use]
    pub fn layer_id(&self) -> LayerId {
        self.inner.nodes.layer()
    }

    /// Returns `true` for trees built with [`Tree::computed`].
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.inner.compute.is_some()
    }

    /// Returns the tree this one is computed from.
    #[must_use]
    pub fn upstream(&self) -> Option<Self> {
        self.inner.nodes.upstream().cloned()
    }

    /// Returns the revision of the last change visible through this layer.
    ///
    /// A computed tree that has not been refreshed reports the revision of
    /// its last pass.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.inner.revision.get()
    }

    /// Returns `true` if both handles refer to the same layer.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Installs a trace sink for this layer, returning the previous one.
    pub fn set_trace_sink(&self, sink: Box<dyn TraceSink>) -> Option<Box<dyn TraceSink>> {
        self.inner.sink.borrow_mut().replace(sink)
    }

    /// Removes the trace sink of this layer.
    pub fn take_trace_sink(&self) -> Option<Box<dyn TraceSink>> {
        self.inner.sink.borrow_mut().take()
    }

    // -- Handles --

    /// Returns the root handle.
    ///
    /// Fails with [`Error::RootNotSet`] before the tree has a root.
    pub fn root(&self) -> Result<TreeHandle> {
        self.refresh()?;
        let root = self.inner.index.borrow().root();
        root.and_then(|id| self.handle_at(id))
            .ok_or(Error::RootNotSet)
    }

    /// Returns the handle for `id`, if the node is part of this tree.
    pub fn get_element(&self, id: NodeId) -> Result<Option<TreeHandle>> {
        self.refresh()?;
        Ok(self.handle_at(id))
    }

    /// Returns an owned copy of the node `id` as this layer resolves it.
    pub fn node(&self, id: NodeId) -> Result<Option<Node>> {
        self.refresh()?;
        self.with_node(id, |node, _| node.copy())
    }

    /// Returns the number of nodes reachable from the root.
    pub fn len(&self) -> Result<usize> {
        self.refresh()?;
        Ok(self.inner.index.borrow().len())
    }

    /// Returns `true` if the tree has no root.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn handle_at(&self, id: NodeId) -> Option<TreeHandle> {
        let state = self.inner.index.borrow().state(id)?;
        Some(TreeHandle::new(id, state, self.clone()))
    }

    fn require(&self, id: NodeId) -> Result<()> {
        if self.inner.index.borrow().contains(id) {
            Ok(())
        } else {
            Err(Error::NodeNotFound(id))
        }
    }

    // -- Resolution --

    /// Calls `f` with node `id` as this layer resolves it, without
    /// refreshing.
    pub(crate) fn with_node<R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&Node, Revision) -> R,
    ) -> Result<Option<R>> {
        self.with_tracer(|tracer| self.inner.nodes.with_node(id, tracer, f))
    }

    /// Calls `f` with the tracer of this layer.
    ///
    /// Falls back to a disabled tracer if the sink is already in use further
    /// up the stack.
    pub(crate) fn with_tracer<R>(&self, f: impl FnOnce(&mut Tracer<'_>) -> R) -> R {
        match self.inner.sink.try_borrow_mut() {
            Ok(mut sink) => match sink.as_deref_mut() {
                Some(sink) => f(&mut Tracer::new(sink)),
                None => f(&mut Tracer::none()),
            },
            Err(_) => f(&mut Tracer::none()),
        }
    }

    /// Collects `(id, children)` for every node reachable from `root`, in
    /// pre-order.
    fn walk(&self, root: NodeId) -> Result<Vec<(NodeId, Vec<NodeId>)>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = alloc::vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let children = self
                .with_node(id, |node, _| node.children().to_vec())?
                .ok_or(Error::NodeNotFound(id))?;
            stack.extend(children.iter().rev().copied());
            out.push((id, children));
        }
        Ok(out)
    }

    // -- Change propagation --

    /// Stamps a new revision and marks every dependent layer dirty.
    fn touch(&self) {
        self.inner.revision.set(Revision::next());
        self.invalidate_dependents();
    }

    fn invalidate_dependents(&self) {
        let dependents: Vec<Self> = {
            let mut list = self.inner.dependents.borrow_mut();
            list.retain(|weak| weak.strong_count() > 0);
            list.iter()
                .filter_map(Weak::upgrade)
                .map(|inner| Self { inner })
                .collect()
        };
        let origin = self.layer_id();
        for dependent in dependents {
            dependent.mark_dirty(origin);
        }
    }
}
