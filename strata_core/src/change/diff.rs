// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal patches between two change sets of the same node.
//!
//! Given the change set last applied to a cached copy (`previous`), the
//! current one, and the source node, [`diff`] yields the patch that turns the
//! cached copy into `source + current` without rebuilding it:
//!
//! 1. Keys only in `previous` were reverted; restore the source value.
//! 2. Keys only in `current` are copied verbatim.
//! 3. Keys in both recurse when both sides are nested maps, are skipped when
//!    both are equal scalars, and are otherwise assigned the fully
//!    materialized current value (a wholesale value is never recursed into).

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use super::{ChangeSet, Delta, FieldChanges};
use crate::node::{Node, NodeId};
use crate::value::{Path, Record, Value};

/// One patch instruction for a field.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOp {
    /// Overwrite the field with this value.
    Assign(Value),
    /// Patch keys inside a map field.
    Nested(BTreeMap<String, PatchOp>),
}

/// The incremental update for one cached copy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    /// Field instructions.
    pub fields: BTreeMap<String, PatchOp>,
    /// New child list, if it changed.
    pub children: Option<Vec<NodeId>>,
}

impl Patch {
    /// Returns `true` if applying the patch is a no-op.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.children.is_none()
    }
}

/// A reverted path that the source node does not have.
///
/// The overlay promised a property the source cannot restore, which means
/// the overlay and its source are inconsistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingPath(pub Path);

/// Computes the patch from `previous` to `current` relative to `source`.
pub fn diff(previous: &ChangeSet, current: &ChangeSet, source: &Node) -> Result<Patch, MissingPath> {
    let mut prefix = Vec::new();
    let fields = diff_fields(
        &previous.fields,
        &current.fields,
        Some(source.fields()),
        &mut prefix,
    )?;
    let children = match (&previous.children, &current.children) {
        (Some(_), None) => Some(source.children().to_vec()),
        (prev, Some(cur)) if prev.as_ref() != Some(cur) => Some(cur.clone()),
        _ => None,
    };
    Ok(Patch { fields, children })
}

fn diff_fields(
    previous: &FieldChanges,
    current: &FieldChanges,
    source: Option<&Record>,
    prefix: &mut Vec<String>,
) -> Result<BTreeMap<String, PatchOp>, MissingPath> {
    let mut out = BTreeMap::new();

    for key in previous.keys() {
        if current.contains_key(key) {
            continue;
        }
        let Some(restored) = source.and_then(|s| s.get(key)) else {
            prefix.push(key.clone());
            return Err(MissingPath(Path::new(prefix.iter().cloned())));
        };
        out.insert(key.clone(), PatchOp::Assign(restored.clone()));
    }

    for (key, cur) in current {
        let base = source.and_then(|s| s.get(key));
        match (previous.get(key), cur) {
            (None, Delta::Nested(inner)) => {
                out.insert(key.clone(), PatchOp::Nested(to_ops(inner)));
            }
            (None, Delta::Value(v) | Delta::Replace(v)) => {
                out.insert(key.clone(), PatchOp::Assign(v.clone()));
            }
            (Some(Delta::Nested(prev)), Delta::Nested(inner)) => {
                prefix.push(key.clone());
                let ops = diff_fields(prev, inner, base.and_then(Value::as_map), prefix)?;
                prefix.pop();
                if !ops.is_empty() {
                    out.insert(key.clone(), PatchOp::Nested(ops));
                }
            }
            (Some(Delta::Value(prev)), Delta::Value(v)) => {
                if prev != v {
                    out.insert(key.clone(), PatchOp::Assign(v.clone()));
                }
            }
            (Some(_), cur) => {
                // Wholesale on either side, or the shape changed.
                out.insert(key.clone(), PatchOp::Assign(cur.materialize(base)));
            }
        }
    }

    Ok(out)
}

fn to_ops(changes: &FieldChanges) -> BTreeMap<String, PatchOp> {
    changes
        .iter()
        .map(|(key, delta)| {
            let op = match delta {
                Delta::Value(v) | Delta::Replace(v) => PatchOp::Assign(v.clone()),
                Delta::Nested(inner) => PatchOp::Nested(to_ops(inner)),
            };
            (key.clone(), op)
        })
        .collect()
}

/// Applies `patch` to `node` in place.
pub fn apply(node: &mut Node, patch: &Patch) {
    apply_ops(node.fields_mut(), &patch.fields);
    if let Some(children) = &patch.children {
        node.children.clone_from(children);
    }
}

/// Applies every entry of `changes` to `node` in place.
pub fn apply_changes(node: &mut Node, changes: &ChangeSet) {
    apply_ops(node.fields_mut(), &to_ops(&changes.fields));
    if let Some(children) = &changes.children {
        node.children.clone_from(children);
    }
}

fn apply_ops(record: &mut Record, ops: &BTreeMap<String, PatchOp>) {
    for (key, op) in ops {
        match op {
            PatchOp::Assign(v) => {
                record.insert(key.clone(), v.clone());
            }
            PatchOp::Nested(inner) => {
                let slot = record
                    .entry(key.clone())
                    .or_insert_with(|| Value::Map(Record::new()));
                if !matches!(slot, Value::Map(_)) {
                    *slot = Value::Map(Record::new());
                }
                if let Value::Map(map) = slot {
                    apply_ops(map, inner);
                }
            }
        }
    }
}
