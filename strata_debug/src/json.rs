// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON bridging for tree snapshots, field values, and tree literals.
//!
//! Snapshots serialize as `{id, name, children?}` objects. Tree literals
//! parse from `{name, children: [...], ...fields}` objects, where every key
//! other than `children` becomes a field.

use serde_json::{Map, Number};
use strata_core::node::NodeSpec;
use strata_core::tree::Snapshot;
use strata_core::value::{Record, Value};

/// Errors from [`spec_from_json`] and [`spec_from_str`].
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// The input is not valid JSON.
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// A tree literal is not a JSON object.
    #[error("tree literal at `{0}` is not an object")]
    NotAnObject(String),
    /// A `children` entry is not an array.
    #[error("`children` at `{0}` is not an array")]
    ChildrenNotArray(String),
}

/// Converts a field value to JSON.
///
/// Non-finite floats have no JSON form and become `null`.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => {
            Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
        }
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(record) => serde_json::Value::Object(
            record
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Converts JSON to a field value.
///
/// Integers that fit `i64` become [`Value::Int`]; other numbers become
/// [`Value::Float`].
#[must_use]
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(value_from_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), value_from_json(v)))
                .collect::<Record>(),
        ),
    }
}

/// Serializes a snapshot as nested `{id, name, children?}` objects.
///
/// Stale snapshots serialize as `{id, stale: true}`.
#[must_use]
pub fn snapshot_to_json(snapshot: &Snapshot) -> serde_json::Value {
    value_to_json(&snapshot.to_value())
}

/// Parses a tree literal.
pub fn spec_from_json(json: &serde_json::Value) -> Result<NodeSpec, JsonError> {
    spec_at(json, "$")
}

/// Parses a tree literal from JSON text.
pub fn spec_from_str(text: &str) -> Result<NodeSpec, JsonError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    spec_from_json(&json)
}

fn spec_at(json: &serde_json::Value, at: &str) -> Result<NodeSpec, JsonError> {
    let serde_json::Value::Object(map) = json else {
        return Err(JsonError::NotAnObject(at.to_owned()));
    };
    let mut spec = NodeSpec::default();
    for (key, value) in map {
        if key == "children" {
            let serde_json::Value::Array(children) = value else {
                return Err(JsonError::ChildrenNotArray(at.to_owned()));
            };
            for (i, child) in children.iter().enumerate() {
                spec.children.push(spec_at(child, &format!("{at}.children[{i}]"))?);
            }
        } else {
            spec.fields.insert(key.clone(), value_from_json(value));
        }
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strata_core::tree::Tree;

    use super::*;

    #[test]
    fn literal_builds_a_tree() {
        let spec = spec_from_str(
            r#"{"name": "root", "weight": 2, "children": [
                {"name": "a", "meta": {"grade": "A"}},
                {"name": "b", "children": [{"name": "b1"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(spec.size(), 4);
        assert_eq!(spec.fields["weight"], Value::Int(2));

        let tree = Tree::source_from(&spec);
        let root = tree.root().unwrap();
        let a = root.children().unwrap().get(0).unwrap();
        assert_eq!(a.get("meta.grade").unwrap(), Some(Value::from("A")));

        let out = snapshot_to_json(&root.snapshot().unwrap());
        assert_eq!(out["name"], "root");
        assert_eq!(out["children"][1]["children"][0]["name"], "b1");
        assert!(
            out["children"][0].get("children").is_none(),
            "leaf snapshots omit children"
        );
        assert_eq!(out["id"], root.id().to_string());
    }

    #[test]
    fn stale_snapshot_serializes() {
        let tree = Tree::source_from(&NodeSpec::new("root").child(NodeSpec::new("a")));
        let a = tree.root().unwrap().children().unwrap().get(0).unwrap();
        a.delete().unwrap();
        let out = snapshot_to_json(&a.snapshot().unwrap());
        assert_eq!(out, json!({"id": a.id().to_string(), "stale": true}));
    }

    #[test]
    fn malformed_literals_are_rejected() {
        assert!(matches!(
            spec_from_json(&json!({"name": "r", "children": [1]})),
            Err(JsonError::NotAnObject(at)) if at == "$.children[0]"
        ));
        assert!(matches!(
            spec_from_json(&json!({"children": {}})),
            Err(JsonError::ChildrenNotArray(at)) if at == "$"
        ));
        assert!(matches!(spec_from_str("{"), Err(JsonError::Parse(_))));
    }

    #[test]
    fn values_convert_both_ways() {
        let json = json!({"n": null, "f": 1.5, "list": [true, "x", 7]});
        let value = value_from_json(&json);
        assert_eq!(value.as_map().unwrap()["f"], Value::Float(1.5));
        assert_eq!(value_to_json(&value), json);
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
    }
}
