// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay bookkeeping and cached-copy materialization.

use alloc::string::ToString;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use super::{OverlayConfig, OverlayType, PatchStrategy};
use crate::change::{self, ChangeSet, MissingPath};
use crate::error::{Error, Result};
use crate::node::{LayerId, Node, NodeId, NodeStore};
use crate::revision::Revision;
#[cfg(feature = "trace-rich")]
use crate::trace::{MaterializeEvent, MaterializeKind};
use crate::trace::Tracer;
use crate::value::{Path, Value};

/// A cached `source.copy()` with a change set applied.
#[derive(Debug)]
struct Materialized {
    copy: Node,
    /// The change set `copy` currently reflects.
    applied: ChangeSet,
    /// Revision of the source node `copy` was built from.
    source: Revision,
    /// Stamped whenever `copy` changes.
    revision: Revision,
}

/// Per-layer overlay state: change sets, added nodes, deleted ids, and the
/// materialized copies of overwritten nodes.
///
/// The store never reaches into its source itself; every operation that
/// needs the source node takes it as an argument, resolved by the caller.
#[derive(Debug)]
pub struct OverlayStore {
    config: OverlayConfig,
    changes: HashMap<NodeId, ChangeSet>,
    added: NodeStore,
    deleted: HashSet<NodeId>,
    cache: HashMap<NodeId, Materialized>,
}

impl Default for OverlayStore {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}

impl OverlayStore {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            changes: HashMap::new(),
            added: NodeStore::new(),
            deleted: HashSet::new(),
            cache: HashMap::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> OverlayConfig {
        self.config
    }

    /// Returns the layer tag of nodes added in this overlay.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.added.layer()
    }

    // -- Bookkeeping --

    /// Creates a node that exists only in this overlay.
    pub fn add(&mut self, node: Node) -> NodeId {
        self.added.add(node)
    }

    /// Hides `id`: removes it if it was added here, otherwise records it as
    /// deleted and drops its changes.
    pub fn delete(&mut self, id: NodeId) {
        if self.added.delete(id).is_some() {
            return;
        }
        self.deleted.insert(id);
        self.changes.remove(&id);
        self.cache.remove(&id);
    }

    /// Returns `true` if `id` was created in this overlay and is alive.
    #[must_use]
    pub fn is_added(&self, id: NodeId) -> bool {
        self.added.exists(id)
    }

    /// Returns `true` if `id` is hidden by this overlay.
    #[must_use]
    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.deleted.contains(&id)
    }

    /// Returns the pending changes for `id`, if any.
    #[must_use]
    pub fn changes(&self, id: NodeId) -> Option<&ChangeSet> {
        self.changes.get(&id)
    }

    /// Returns `true` if nothing is added, deleted, or overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    /// Returns the number of cached copies.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Erases every change, added node, deleted id, and cached copy.
    pub fn clear_all_changes(&mut self) {
        self.changes.clear();
        self.added.clear();
        self.deleted.clear();
        self.cache.clear();
    }

    // -- Writes --

    /// Writes `value` at `path` of node `id`.
    ///
    /// Added nodes are mutated directly. For source nodes the value is
    /// recorded in the node's change set, or pruned from it when it equals
    /// the source value; an emptied change set is dropped along with its
    /// cached copy.
    ///
    /// Fails with [`Error::NodeNotFound`] if `id` is deleted, or is neither
    /// added here nor present in the source (`source` is `None`).
    pub fn set(
        &mut self,
        id: NodeId,
        path: &Path,
        value: Value,
        source: Option<&Node>,
    ) -> Result<()> {
        let source = self.writable(id, source)?;
        let Some(source) = source else {
            return self.added.update(id, |node| node.set_field(path, value));
        };
        let changes = self.changes.entry(id).or_default();
        changes.record(path, value, source.fields());
        self.prune(id);
        Ok(())
    }

    /// Overrides the child list of node `id` wholesale.
    pub fn set_children(
        &mut self,
        id: NodeId,
        children: Vec<NodeId>,
        source: Option<&Node>,
    ) -> Result<()> {
        let source = self.writable(id, source)?;
        let Some(source) = source else {
            return self.added.update(id, |node| node.children = children);
        };
        let changes = self.changes.entry(id).or_default();
        changes.record_children(children, source.children());
        self.prune(id);
        Ok(())
    }

    /// Replaces the fields of node `id` with those of `node`.
    ///
    /// The child list is structural and is kept. On source nodes, fields the
    /// source has but `node` lacks are overridden with [`Value::Null`], and
    /// fields only this overlay wrote are dropped.
    pub fn replace(&mut self, id: NodeId, node: &Node, source: Option<&Node>) -> Result<()> {
        let source = self.writable(id, source)?;
        let Some(source) = source else {
            return self.added.update(id, |slot| {
                *slot.fields_mut() = node.fields().clone();
            });
        };
        let changes = self.changes.entry(id).or_default();
        let written = changes.fields.len();
        changes
            .fields
            .retain(|key, _| node.fields().contains_key(key) || source.fields().contains_key(key));
        if changes.fields.len() != written {
            // The source cannot restore dropped keys; rebuild the copy.
            self.cache.remove(&id);
        }
        for key in source.fields().keys() {
            if !node.fields().contains_key(key) {
                changes.record(&Path::new([key.as_str()]), Value::Null, source.fields());
            }
        }
        for (key, value) in node.fields() {
            changes.record(&Path::new([key.as_str()]), value.clone(), source.fields());
        }
        self.prune(id);
        Ok(())
    }

    /// Checks that `id` can be written, returning the source node for
    /// non-added ids.
    fn writable<'s>(&self, id: NodeId, source: Option<&'s Node>) -> Result<Option<&'s Node>> {
        if self.deleted.contains(&id) {
            return Err(Error::NodeNotFound(id));
        }
        if self.added.exists(id) {
            return Ok(None);
        }
        source.map(Some).ok_or(Error::NodeNotFound(id))
    }

    /// Drops the change set (and cached copy) of `id` once it is empty.
    fn prune(&mut self, id: NodeId) {
        if self.changes.get(&id).is_some_and(ChangeSet::is_empty) {
            self.changes.remove(&id);
            self.cache.remove(&id);
        }
    }

    // -- Resolution --

    /// Returns the provenance of `id` as this overlay would resolve it.
    #[must_use]
    pub fn overlay_type(&self, id: NodeId) -> OverlayType {
        if self.added.exists(id) {
            OverlayType::Added
        } else if self.changes.contains_key(&id) {
            OverlayType::Overwritten
        } else {
            OverlayType::Src
        }
    }

    /// Returns `true` if `id` differs from its source.
    #[must_use]
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.overlay_type(id) != OverlayType::Src
    }

    /// Returns `true` if `path` of `id` differs from its source.
    ///
    /// Every property of an added node is dirty.
    #[must_use]
    pub fn is_property_dirty(&self, id: NodeId, path: &Path) -> bool {
        self.added.exists(id) || self.changes.get(&id).is_some_and(|c| c.contains(path))
    }

    /// Resolves `id`: the added node, else the overwritten copy, else the
    /// source node, else nothing.
    ///
    /// `source` is the source node with its current revision, if the source
    /// has one.
    pub fn get<'a>(
        &'a mut self,
        id: NodeId,
        source: Option<(&'a Node, Revision)>,
    ) -> Result<Option<&'a Node>> {
        let resolved = self.resolve(id, source, &mut Tracer::none())?;
        Ok(resolved.map(|(node, _)| node))
    }

    /// Like [`get`](Self::get), but also returns the revision of the
    /// resolved node and reports materialization to `tracer`.
    pub(crate) fn resolve<'a>(
        &'a mut self,
        id: NodeId,
        source: Option<(&'a Node, Revision)>,
        tracer: &mut Tracer<'_>,
    ) -> Result<Option<(&'a Node, Revision)>> {
        if self.deleted.contains(&id) {
            return Ok(None);
        }
        if self.added.exists(id) {
            return Ok(self.added.get(id).zip(self.added.revision(id)));
        }
        let Some((node, source_rev)) = source else {
            return Ok(None);
        };
        if !self.changes.contains_key(&id) {
            debug_assert!(!self.cache.contains_key(&id), "cache outlived its changes");
            return Ok(Some((node, source_rev)));
        }
        self.refresh_copy(id, node, source_rev, tracer)?;
        Ok(self.cache.get(&id).map(|m| (&m.copy, m.revision)))
    }

    /// Brings the cached copy of `id` up to date with its change set.
    fn refresh_copy(
        &mut self,
        id: NodeId,
        source: &Node,
        source_rev: Revision,
        tracer: &mut Tracer<'_>,
    ) -> Result<()> {
        let Some(current) = self.changes.get(&id) else {
            return Ok(());
        };
        #[cfg(not(feature = "trace-rich"))]
        let _ = tracer;
        let reusable = self.cache.get(&id).is_some_and(|m| m.source == source_rev);
        if reusable && let Some(m) = self.cache.get_mut(&id) {
            if m.applied == *current {
                return Ok(());
            }
            if self.config.patching == PatchStrategy::Incremental {
                let patch = change::diff(&m.applied, current, source).map_err(
                    |MissingPath(path)| Error::MissingSourcePath {
                        id,
                        path: path.to_string(),
                    },
                )?;
                change::apply(&mut m.copy, &patch);
                m.applied = current.clone();
                m.revision = Revision::next();
                #[cfg(feature = "trace-rich")]
                note(tracer, self.added.layer(), id, MaterializeKind::Incremental);
                return Ok(());
            }
        }
        let copy = change::overlaid(source, current);
        self.cache.insert(
            id,
            Materialized {
                copy,
                applied: current.clone(),
                source: source_rev,
                revision: Revision::next(),
            },
        );
        #[cfg(feature = "trace-rich")]
        note(tracer, self.added.layer(), id, MaterializeKind::Fresh);
        Ok(())
    }
}

#[cfg(feature = "trace-rich")]
fn note(tracer: &mut Tracer<'_>, layer: LayerId, id: NodeId, kind: MaterializeKind) {
    tracer.materialize(&MaterializeEvent {
        layer: layer.get(),
        node_index: id.index(),
        kind,
    });
}
