// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic field values and nested property paths.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// A map of named field values.
pub type Record = BTreeMap<String, Value>;

/// A dynamically typed field value.
///
/// `List` and `Map` are *compound*: overlays always treat them as wholesale
/// replacements unless a write addresses a key inside a `Map` explicitly.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent or cleared value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested record.
    Map(Record),
}

impl Value {
    /// Returns `true` for values that are neither lists nor maps.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Returns the text content, if this is a `Text` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an `Int` value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a `Bool` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the nested record, if this is a `Map` value.
    #[must_use]
    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Map(v)
    }
}

/// A nested property path such as `meta.grade`.
///
/// Paths are never empty.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<String>);

impl Path {
    /// Builds a path from its segments.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    #[must_use]
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        assert!(!segments.is_empty(), "path must have at least one segment");
        Self(segments)
    }

    /// Parses a dotted path (`"meta.grade"`).
    ///
    /// # Panics
    ///
    /// Panics if `dotted` is empty.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the first segment.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// Returns `true` if one path is a prefix of the other.
    ///
    /// Two overlapping paths observe each other's writes.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(seg)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<&Self> for Path {
    fn from(path: &Self) -> Self {
        path.clone()
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

/// Looks up the value at `path` inside `record`.
#[must_use]
pub fn lookup<'a>(record: &'a Record, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = record.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Map(inner) => lookup(inner, rest),
        _ => None,
    }
}

/// Writes `value` at `path`, creating (or overwriting non-map) intermediate
/// values with empty maps.
pub fn assign(record: &mut Record, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        record.insert(first.clone(), value);
        return;
    }
    let slot = record
        .entry(first.clone())
        .or_insert_with(|| Value::Map(Record::new()));
    if !matches!(slot, Value::Map(_)) {
        *slot = Value::Map(Record::new());
    }
    if let Value::Map(inner) = slot {
        assign(inner, rest, value);
    }
}
