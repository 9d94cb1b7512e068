// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External state read by recompute functions, with dependency capture.
//!
//! A [`State`] is an observable record shared between the caller and any
//! computed layers built from it. Every write stamps the written path with a
//! fresh [`Revision`]. During a recompute pass the function only sees the
//! state through [`Tracked`], which records a [`Dependency`] for each read.
//! After the pass, a dependency is stale once a write overlapping its path
//! carries a newer revision than the one it saw.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::revision::Revision;
use crate::value::{self, Path, Record, Value};

#[derive(Default)]
struct StateInner {
    record: Record,
    written: BTreeMap<Path, Revision>,
}

/// A shared, observable record of external inputs.
///
/// Cloning a `State` yields another handle to the same record.
#[derive(Clone, Default)]
pub struct State {
    inner: Rc<RefCell<StateInner>>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&self.inner.borrow().record).finish()
    }
}

impl State {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state holding `record`.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StateInner {
                record,
                written: BTreeMap::new(),
            })),
        }
    }

    /// Returns a copy of the value at `path`.
    ///
    /// This read is not tracked; recompute functions read through
    /// [`Tracked`] instead.
    #[must_use]
    pub fn get(&self, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        value::lookup(&self.inner.borrow().record, path.segments()).cloned()
    }

    /// Writes `value` at `path`.
    ///
    /// Writing the value already stored is a no-op and does not invalidate
    /// anything.
    pub fn set(&self, path: impl Into<Path>, value: impl Into<Value>) {
        let path = path.into();
        let value = value.into();
        let mut inner = self.inner.borrow_mut();
        if value::lookup(&inner.record, path.segments()) == Some(&value) {
            return;
        }
        value::assign(&mut inner.record, path.segments(), value);
        inner.written.insert(path, Revision::next());
    }

    /// Returns the newest revision of any write overlapping `path`.
    ///
    /// Paths never written report [`Revision::ZERO`].
    #[must_use]
    pub fn revision_of(&self, path: &Path) -> Revision {
        self.inner
            .borrow()
            .written
            .iter()
            .filter(|(written, _)| written.overlaps(path))
            .map(|(_, rev)| *rev)
            .max()
            .unwrap_or(Revision::ZERO)
    }

    /// Returns `true` if both handles refer to the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// One state read captured during a recompute pass.
#[derive(Clone, Debug)]
pub struct Dependency {
    state: State,
    path: Path,
    seen: Revision,
}

impl Dependency {
    /// Returns the path that was read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the revision of the path when it was read.
    #[must_use]
    pub fn seen(&self) -> Revision {
        self.seen
    }

    /// Returns the state the path was read from.
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Returns `true` if the path was written after it was read.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.state.revision_of(&self.path) > self.seen
    }
}

/// A read-only view of a [`State`] that records every read.
#[derive(Debug)]
pub struct Tracked<'a> {
    state: &'a State,
    reads: RefCell<Vec<Dependency>>,
}

impl<'a> Tracked<'a> {
    pub(crate) fn new(state: &'a State) -> Self {
        Self {
            state,
            reads: RefCell::new(Vec::new()),
        }
    }

    /// Returns a copy of the value at `path`, recording the read.
    #[must_use]
    pub fn get(&self, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        let seen = self.state.revision_of(&path);
        let value = self.state.get(&path);
        let mut reads = self.reads.borrow_mut();
        if !reads.iter().any(|d| d.path == path) {
            reads.push(Dependency {
                state: self.state.clone(),
                path,
                seen,
            });
        }
        value
    }

    /// Returns the text at `path`, recording the read.
    #[must_use]
    pub fn text(&self, path: impl Into<Path>) -> Option<alloc::string::String> {
        match self.get(path)? {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn into_dependencies(self) -> Vec<Dependency> {
        self.reads.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_stamp_overlapping_paths() {
        let state = State::new();
        state.set("filter.grade", "A");
        let grade = state.revision_of(&"filter.grade".into());
        assert!(grade > Revision::ZERO);
        assert_eq!(
            state.revision_of(&"filter".into()),
            grade,
            "a parent path observes writes below it"
        );
        assert_eq!(state.revision_of(&"other".into()), Revision::ZERO);
    }

    #[test]
    fn same_value_write_is_noop() {
        let state = State::new();
        state.set("n", 1);
        let before = state.revision_of(&"n".into());
        state.set("n", 1);
        assert_eq!(state.revision_of(&"n".into()), before);
    }

    #[test]
    fn tracked_reads_become_dependencies() {
        let state = State::new();
        state.set("a", 1);
        let tracked = Tracked::new(&state);
        assert_eq!(tracked.get("a"), Some(Value::Int(1)));
        assert_eq!(tracked.get("missing"), None);
        let _ = tracked.get("a");
        let deps = tracked.into_dependencies();
        assert_eq!(deps.len(), 2, "repeated reads are recorded once");
        assert!(deps.iter().all(|d| !d.is_stale()));

        state.set("b", 2);
        assert!(deps.iter().all(|d| !d.is_stale()), "unrelated write");
        state.set("missing", true);
        assert!(deps[1].is_stale(), "a path read while absent goes stale");
        assert!(!deps[0].is_stale());
    }

    #[test]
    fn clones_share_the_record() {
        let a = State::new();
        let b = a.clone();
        b.set("x", "y");
        assert_eq!(a.get("x"), Some(Value::from("y")));
        assert!(a.ptr_eq(&b));
    }
}
