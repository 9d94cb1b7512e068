// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered collections of node handles.

use alloc::string::ToString;
use alloc::vec::Vec;

use super::{Tree, TreeHandle};
use crate::error::{Error, Result};
use crate::node::NodeId;

/// An ordered collection of nodes: the children, ancestors, descendants, or
/// leafs of a handle.
///
/// The list is a capture taken when it was requested; later structural
/// changes are not reflected.
#[derive(Clone, Debug)]
pub struct NodeList {
    tree: Tree,
    ids: Vec<NodeId>,
}

impl NodeList {
    pub(crate) fn new(tree: Tree, ids: Vec<NodeId>) -> Self {
        Self { tree, ids }
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the ids, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.ids.clone()
    }

    /// Returns `true` if `id` is in the list.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns the handle at `ordinal`.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<TreeHandle> {
        self.ids.get(ordinal).and_then(|&id| self.tree.handle_at(id))
    }

    /// Returns the handle for `id` if it is in the list.
    #[must_use]
    pub fn by_id(&self, id: NodeId) -> Option<TreeHandle> {
        if self.contains(id) {
            self.tree.handle_at(id)
        } else {
            None
        }
    }

    /// Iterates over the handles, in order.
    pub fn iter(&self) -> impl Iterator<Item = TreeHandle> + '_ {
        self.ids.iter().filter_map(|&id| self.tree.handle_at(id))
    }

    /// Returns the first handle matching `pred`.
    pub fn find(&self, pred: impl FnMut(&TreeHandle) -> bool) -> Option<TreeHandle> {
        self.iter().find(pred)
    }

    /// Returns `true` if any handle matches `pred`.
    pub fn has(&self, mut pred: impl FnMut(&TreeHandle) -> bool) -> bool {
        self.iter().any(|handle| pred(&handle))
    }

    /// Follows a comma-separated ordinal path: the first ordinal selects from
    /// this list, each further one from the children of the previous pick.
    ///
    /// `"1,0"` is the first child of the second entry. Returns `None` when an
    /// ordinal is out of range, [`Error::UndefinedIndex`] for an empty path,
    /// and [`Error::IncorrectIndex`] when an ordinal is not a number.
    pub fn at_path(&self, path: &str) -> Result<Option<TreeHandle>> {
        if path.trim().is_empty() {
            return Err(Error::UndefinedIndex);
        }
        let mut ordinals = path.split(',').map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| Error::IncorrectIndex(path.to_string()))
        });
        let first = ordinals.next().unwrap_or(Err(Error::UndefinedIndex))?;
        let Some(mut current) = self.get(first) else {
            return Ok(None);
        };
        for ordinal in ordinals {
            let ordinal = ordinal?;
            match current.children()?.get(ordinal) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}
