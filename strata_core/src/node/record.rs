// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node records and tree literals.

use alloc::string::String;
use alloc::vec::Vec;

use super::id::NodeId;
use crate::value::{self, Path, Record, Value};

/// Field that holds a node's display name.
pub const NAME: &str = "name";

/// Reserved key naming the child-id list. It is never a field.
pub const CHILDREN: &str = "children";

/// A node record: named fields plus an ordered list of child ids.
///
/// The child list is readable but can only be changed by the structural
/// operations of a tree, so cached handles and adjacency never desynchronize.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub(crate) children: Vec<NodeId>,
    fields: Record,
}

impl Node {
    /// Creates a childless node with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Record::new();
        fields.insert(NAME.into(), Value::Text(name.into()));
        Self {
            children: Vec::new(),
            fields,
        }
    }

    /// Creates a childless node from a field record.
    #[must_use]
    pub fn from_fields(fields: Record) -> Self {
        Self {
            children: Vec::new(),
            fields,
        }
    }

    /// Adds a top-level field, builder style.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the node's name, if it has a text `name` field.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.fields.get(NAME).and_then(Value::as_str)
    }

    /// Returns the value at `path`.
    #[must_use]
    pub fn field(&self, path: &Path) -> Option<&Value> {
        value::lookup(&self.fields, path.segments())
    }

    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &Record {
        &self.fields
    }

    /// Returns all fields mutably.
    ///
    /// Only meaningful on detached copies; nodes inside a tree are changed
    /// through the tree so overlays can record the change.
    pub fn fields_mut(&mut self) -> &mut Record {
        &mut self.fields
    }

    /// Returns the ordered child ids.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Produces a value-independent copy.
    ///
    /// Nested maps and lists are owned, so mutating the copy never affects
    /// the original.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub(crate) fn set_field(&mut self, path: &Path, value: Value) {
        value::assign(&mut self.fields, path.segments(), value);
    }
}

/// A nested tree literal (`{name, children: [...]}`) used to build trees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeSpec {
    /// Fields of this node.
    pub fields: Record,
    /// Child literals, in order.
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Creates a childless literal with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Record::new();
        fields.insert(NAME.into(), Value::Text(name.into()));
        Self {
            fields,
            children: Vec::new(),
        }
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Appends a child literal, builder style.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several child literals, builder style.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Returns the number of nodes in this literal, itself included.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn copy_is_value_independent() {
        let mut meta = Record::new();
        meta.insert("grade".into(), Value::from("A"));
        let original = Node::new("Root")
            .with_field("meta", meta)
            .with_field("tags", vec![Value::from("x")]);

        let mut copy = original.copy();
        copy.set_field(&Path::from("meta.grade"), Value::from("B"));
        if let Some(Value::List(tags)) = copy.fields_mut().get_mut("tags") {
            tags.push(Value::from("y"));
        }

        assert_eq!(
            original.field(&Path::from("meta.grade")),
            Some(&Value::from("A")),
            "nested map of the original is untouched"
        );
        assert_eq!(
            original.field(&Path::from("tags")),
            Some(&Value::List(vec![Value::from("x")])),
            "nested list of the original is untouched"
        );
    }

    #[test]
    fn literal_size_counts_all_nodes() {
        let spec = NodeSpec::new("root")
            .child(NodeSpec::new("A").child(NodeSpec::new("A1")))
            .child(NodeSpec::new("B"));
        assert_eq!(spec.size(), 4);
    }
}
