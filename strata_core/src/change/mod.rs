// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node change sets and the diff engine that patches cached copies.
//!
//! A [`ChangeSet`] records, for one node, every field path an overlay has
//! overridden. Each entry is a [`Delta`]:
//!
//! - **Value**: a scalar leaf.
//! - **Replace**: a compound value assigned wholesale. It is never merged
//!   key-by-key with what it replaced.
//! - **Nested**: deeper paths inside a map field.
//!
//! Child-list overrides are always wholesale.
//!
//! [`diff`] computes the minimal [`Patch`] that brings a copy built from one
//! change set up to date with another; [`apply`] writes it.

mod diff;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::node::{Node, NodeId};
use crate::value::{self, Path, Record, Value};

pub use diff::{MissingPath, Patch, PatchOp, apply, apply_changes, diff};

/// Field deltas keyed by field name.
pub type FieldChanges = BTreeMap<String, Delta>;

/// One override entry in a [`ChangeSet`].
#[derive(Clone, Debug, PartialEq)]
pub enum Delta {
    /// A scalar leaf value.
    Value(Value),
    /// A compound value assigned wholesale.
    Replace(Value),
    /// Overrides of keys inside a map field.
    Nested(FieldChanges),
}

impl Delta {
    /// Wraps `value` as a leaf or a wholesale replacement.
    #[must_use]
    pub fn leaf(value: Value) -> Self {
        if value.is_scalar() {
            Self::Value(value)
        } else {
            Self::Replace(value)
        }
    }

    /// Returns the value this delta produces on top of `base`.
    #[must_use]
    pub fn materialize(&self, base: Option<&Value>) -> Value {
        match self {
            Self::Value(v) | Self::Replace(v) => v.clone(),
            Self::Nested(changes) => {
                let mut record = base.and_then(Value::as_map).cloned().unwrap_or_default();
                for (key, delta) in changes {
                    let next = delta.materialize(record.get(key));
                    record.insert(key.clone(), next);
                }
                Value::Map(record)
            }
        }
    }
}

/// Every pending override for one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Field overrides.
    pub fields: FieldChanges,
    /// Wholesale child-list override.
    pub children: Option<Vec<NodeId>>,
}

impl ChangeSet {
    /// Returns `true` if nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.children.is_none()
    }

    /// Returns `true` if `path` (or anything below it) is overridden.
    ///
    /// Paths below a wholesale replacement count as overridden.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        fn walk(changes: &FieldChanges, path: &[String]) -> bool {
            let Some((first, rest)) = path.split_first() else {
                return false;
            };
            match changes.get(first) {
                None => false,
                Some(_) if rest.is_empty() => true,
                Some(Delta::Nested(inner)) => walk(inner, rest),
                Some(_) => true,
            }
        }
        walk(&self.fields, path.segments())
    }

    /// Records `value` at `path`, or prunes the entry if `value` equals the
    /// source value.
    ///
    /// `source` is the field record of the node this change set overlays.
    /// Writes below a wholesale replacement always land inside it.
    pub fn record(&mut self, path: &Path, value: Value, source: &Record) {
        let inside_wholesale = below_wholesale(&self.fields, path.segments());
        if !inside_wholesale && value::lookup(source, path.segments()) == Some(&value) {
            remove(&mut self.fields, path.segments());
        } else {
            insert(&mut self.fields, path.segments(), value);
        }
    }

    /// Records a child-list override, or prunes it if it equals `source`.
    pub fn record_children(&mut self, children: Vec<NodeId>, source: &[NodeId]) {
        self.children = (children != source).then_some(children);
    }
}

/// Inserts `value` at `path`, building nested deltas along the way.
fn insert(changes: &mut FieldChanges, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        changes.insert(first.clone(), Delta::leaf(value));
        return;
    }
    match changes.get_mut(first) {
        Some(Delta::Nested(inner)) => insert(inner, rest, value),
        Some(Delta::Replace(Value::Map(record))) => value::assign(record, rest, value),
        Some(slot) => {
            // A scalar (or list) was assigned here; the new shape is a fresh map.
            let mut record = Record::new();
            value::assign(&mut record, rest, value);
            *slot = Delta::Replace(Value::Map(record));
        }
        None => {
            let mut inner = FieldChanges::new();
            insert(&mut inner, rest, value);
            changes.insert(first.clone(), Delta::Nested(inner));
        }
    }
}

/// Removes the delta at `path`, pruning nested maps left empty.
fn remove(changes: &mut FieldChanges, path: &[String]) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        changes.remove(first);
        return;
    }
    let now_empty = match changes.get_mut(first) {
        Some(Delta::Nested(inner)) => {
            remove(inner, rest);
            inner.is_empty()
        }
        _ => false,
    };
    if now_empty {
        changes.remove(first);
    }
}

/// Returns `true` if a proper prefix of `path` is held by a non-nested delta.
fn below_wholesale(changes: &FieldChanges, path: &[String]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    match changes.get(first) {
        Some(Delta::Nested(inner)) => below_wholesale(inner, rest),
        Some(_) => true,
        None => false,
    }
}

/// Builds the node an overlay presents: `source` with `changes` applied.
#[must_use]
pub fn overlaid(source: &Node, changes: &ChangeSet) -> Node {
    let mut node = source.copy();
    apply_changes(&mut node, changes);
    node
}
