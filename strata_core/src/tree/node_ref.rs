// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform "current value of id X" access for one tree layer.
//!
//! A layer is backed either by its own [`NodeStore`] (a source tree) or by an
//! [`OverlayStore`] over an upstream tree (a computed tree). [`NodeRef`]
//! hides the difference from the structural code above it.
//!
//! Resolution here never triggers a recompute; callers refresh first.

use alloc::vec::Vec;
use core::cell::RefCell;

use super::Tree;
use crate::error::{Error, Result};
use crate::node::{LayerId, Node, NodeId, NodeStore};
use crate::overlay::{OverlayConfig, OverlayStore, OverlayType};
use crate::revision::Revision;
#[cfg(feature = "trace-rich")]
use crate::trace::{MaterializeEvent, MaterializeKind};
use crate::trace::Tracer;
use crate::value::{Path, Value};

/// A write routed through [`NodeRef::edit`].
#[derive(Debug)]
pub(crate) enum Edit<'a> {
    Field(&'a Path, Value),
    Children(Vec<NodeId>),
    Replace(&'a Node),
}

#[derive(Debug)]
pub(crate) enum NodeRef {
    Source(RefCell<NodeStore>),
    Overlay {
        upstream: Tree,
        overlay: RefCell<OverlayStore>,
    },
}

impl NodeRef {
    pub(crate) fn source() -> Self {
        Self::Source(RefCell::new(NodeStore::new()))
    }

    pub(crate) fn overlay(upstream: Tree, config: OverlayConfig) -> Self {
        Self::Overlay {
            upstream,
            overlay: RefCell::new(OverlayStore::new(config)),
        }
    }

    pub(crate) fn layer(&self) -> LayerId {
        match self {
            Self::Source(store) => store.borrow().layer(),
            Self::Overlay { overlay, .. } => overlay.borrow().layer(),
        }
    }

    pub(crate) fn upstream(&self) -> Option<&Tree> {
        match self {
            Self::Source(_) => None,
            Self::Overlay { upstream, .. } => Some(upstream),
        }
    }

    // -- Reads --

    /// Calls `f` with the resolved node and its revision, or returns `None`
    /// if `id` does not resolve in this layer.
    pub(crate) fn with_node<R>(
        &self,
        id: NodeId,
        tracer: &mut Tracer<'_>,
        f: impl FnOnce(&Node, Revision) -> R,
    ) -> Result<Option<R>> {
        match self {
            Self::Source(store) => {
                let store = store.borrow();
                Ok(store.get(id).zip(store.revision(id)).map(|(n, r)| f(n, r)))
            }
            Self::Overlay { upstream, overlay } => {
                let mut overlay = overlay.borrow_mut();
                if overlay.is_deleted(id) {
                    return Ok(None);
                }
                if overlay.is_added(id) {
                    let resolved = overlay.resolve(id, None, tracer)?;
                    return Ok(resolved.map(|(n, r)| f(n, r)));
                }
                let resolved = upstream.with_node(id, |src, rev| {
                    let resolved = overlay.resolve(id, Some((src, rev)), tracer)?;
                    Ok(resolved.map(|(n, r)| f(n, r)))
                })?;
                Ok(resolved.transpose()?.flatten())
            }
        }
    }

    /// Calls `f` with the node as the backing source holds it, bypassing
    /// this layer's overlay.
    pub(crate) fn with_previous<R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&Node) -> R,
    ) -> Result<Option<R>> {
        match self {
            Self::Source(store) => Ok(store.borrow().get(id).map(f)),
            Self::Overlay { upstream, .. } => upstream.with_node(id, |src, _| f(src)),
        }
    }

    pub(crate) fn overlay_type(&self, id: NodeId) -> OverlayType {
        match self {
            Self::Source(_) => OverlayType::Src,
            Self::Overlay { overlay, .. } => overlay.borrow().overlay_type(id),
        }
    }

    pub(crate) fn is_dirty(&self, id: NodeId) -> bool {
        match self {
            Self::Source(_) => false,
            Self::Overlay { overlay, .. } => overlay.borrow().is_dirty(id),
        }
    }

    pub(crate) fn is_property_dirty(&self, id: NodeId, path: &Path) -> bool {
        match self {
            Self::Source(_) => false,
            Self::Overlay { overlay, .. } => overlay.borrow().is_property_dirty(id, path),
        }
    }

    // -- Writes --

    pub(crate) fn add(&self, node: Node) -> NodeId {
        match self {
            Self::Source(store) => store.borrow_mut().add(node),
            Self::Overlay { overlay, .. } => overlay.borrow_mut().add(node),
        }
    }

    pub(crate) fn remove(&self, id: NodeId) {
        match self {
            Self::Source(store) => {
                store.borrow_mut().delete(id);
            }
            Self::Overlay { overlay, .. } => overlay.borrow_mut().delete(id),
        }
    }

    /// Forgets every node (source) or every change (overlay).
    pub(crate) fn clear(&self) {
        match self {
            Self::Source(store) => store.borrow_mut().clear(),
            Self::Overlay { overlay, .. } => overlay.borrow_mut().clear_all_changes(),
        }
    }

    /// Applies `edit` to node `id`.
    pub(crate) fn edit(&self, id: NodeId, edit: Edit<'_>, tracer: &mut Tracer<'_>) -> Result<()> {
        match self {
            Self::Source(store) => store.borrow_mut().update(id, |node| match edit {
                Edit::Field(path, value) => node.set_field(path, value),
                Edit::Children(children) => node.children = children,
                Edit::Replace(with) => *node.fields_mut() = with.fields().clone(),
            }),
            Self::Overlay { upstream, overlay } => {
                let mut overlay = overlay.borrow_mut();
                let before = overlay.overlay_type(id);
                let apply = |overlay: &mut OverlayStore, source: Option<&Node>| match edit {
                    Edit::Field(path, value) => overlay.set(id, path, value, source),
                    Edit::Children(children) => overlay.set_children(id, children, source),
                    Edit::Replace(with) => overlay.replace(id, with, source),
                };
                let result = if overlay.is_added(id) || overlay.is_deleted(id) {
                    apply(&mut *overlay, None)
                } else {
                    upstream
                        .with_node(id, |src, _| apply(&mut *overlay, Some(src)))?
                        .unwrap_or(Err(Error::NodeNotFound(id)))
                };

                #[cfg(feature = "trace-rich")]
                if result.is_ok()
                    && before == OverlayType::Overwritten
                    && overlay.overlay_type(id) == OverlayType::Src
                {
                    tracer.materialize(&MaterializeEvent {
                        layer: overlay.layer().get(),
                        node_index: id.index(),
                        kind: MaterializeKind::Dropped,
                    });
                }
                #[cfg(not(feature = "trace-rich"))]
                let _ = (tracer, before);

                result
            }
        }
    }
}
