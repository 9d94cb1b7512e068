// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Computed layers: dirty detection and recompute passes.
//!
//! A computed tree is dirty when it was never computed, when an upstream
//! layer changed (pushed through [`Tree::invalidate_dependents`]), or when a
//! [`State`] path read by its last pass has been written since (pulled by
//! comparing revisions). Every read through the tree refreshes it first.
//!
//! A pass clears the overlay, rebuilds the structural index from the
//! upstream tree, and calls the recompute function with the root handle.
//! While a pass runs, refreshes of the same layer are suppressed so the
//! function can read and write its own tree.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use super::{Tree, TreeHandle};
use crate::error::{Error, Result};
use crate::node::LayerId;
use crate::overlay::OverlayConfig;
use crate::revision::Revision;
use crate::state::{Dependency, State, Tracked};
use crate::trace::{
    InvalidateCause, InvalidateEvent, RecomputeBeginEvent, RecomputeEndEvent, count_u32,
};

type RecomputeFn = dyn Fn(&Tracked<'_>, &TreeHandle) -> Result<()>;

/// Configuration for a computed tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputedConfig {
    /// Overlay settings for the layer.
    pub overlay: OverlayConfig,
    /// Run the first pass inside the constructor instead of on first read.
    pub recompute_on_create: bool,
}

pub(super) struct Compute {
    state: State,
    recompute_fn: Rc<RecomputeFn>,
    dirty: Cell<bool>,
    recomputing: Cell<bool>,
    passes: Cell<u64>,
    dependencies: RefCell<Vec<Dependency>>,
}

/// Clears the `recomputing` flag when a pass unwinds or returns.
struct PassGuard<'a>(&'a Cell<bool>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Tree {
    /// Creates a computed tree over `upstream`.
    ///
    /// `recompute_fn` receives a tracked view of `state` and the root handle
    /// of the new tree. It runs lazily: on the first read, and again on the
    /// first read after `upstream` or a state path it read has changed. Each
    /// run starts from a cleared overlay, so edits it does not re-apply are
    /// discarded.
    pub fn computed<F>(upstream: &Self, state: State, recompute_fn: F) -> Self
    where
        F: Fn(&Tracked<'_>, &TreeHandle) -> Result<()> + 'static,
    {
        Self::attach_computed(upstream, state, Rc::new(recompute_fn), OverlayConfig::default())
    }

    /// Like [`computed`](Self::computed), with explicit configuration.
    ///
    /// Fails only if `config.recompute_on_create` is set and the first pass
    /// fails.
    pub fn computed_with<F>(
        upstream: &Self,
        state: State,
        recompute_fn: F,
        config: ComputedConfig,
    ) -> Result<Self>
    where
        F: Fn(&Tracked<'_>, &TreeHandle) -> Result<()> + 'static,
    {
        let tree = Self::attach_computed(upstream, state, Rc::new(recompute_fn), config.overlay);
        if config.recompute_on_create {
            tree.refresh()?;
        }
        Ok(tree)
    }

    fn attach_computed(
        upstream: &Self,
        state: State,
        recompute_fn: Rc<RecomputeFn>,
        overlay: OverlayConfig,
    ) -> Self {
        let compute = Compute {
            state,
            recompute_fn,
            dirty: Cell::new(true),
            recomputing: Cell::new(false),
            passes: Cell::new(0),
            dependencies: RefCell::new(Vec::new()),
        };
        let tree = Self::from_parts(
            super::NodeRef::overlay(upstream.clone(), overlay),
            Some(compute),
        );
        upstream
            .inner
            .dependents
            .borrow_mut()
            .push(Rc::downgrade(&tree.inner));
        tree
    }

    /// Returns the state a computed tree reads.
    #[must_use]
    pub fn state(&self) -> Option<State> {
        self.inner.compute.as_ref().map(|c| c.state.clone())
    }

    /// Returns `true` if the next read will run a recompute pass, here or
    /// in an upstream layer.
    #[must_use]
    pub fn needs_recompute(&self) -> bool {
        let Some(compute) = &self.inner.compute else {
            return false;
        };
        compute.dirty.get()
            || compute.dependencies.borrow().iter().any(Dependency::is_stale)
            || self.upstream().is_some_and(|up| up.needs_recompute())
    }

    /// Returns the number of recompute passes started so far.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.inner.compute.as_ref().map_or(0, |c| c.passes.get())
    }

    /// Returns the state reads captured by the last successful pass.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.inner
            .compute
            .as_ref()
            .map_or_else(Vec::new, |c| c.dependencies.borrow().clone())
    }

    /// Runs a recompute pass now, whether or not the layer is dirty.
    ///
    /// Does nothing on a source tree. Fails with
    /// [`Error::RecomputeInProgress`] when called from inside a pass of the
    /// same layer.
    pub fn recompute(&self) -> Result<()> {
        let Some(compute) = &self.inner.compute else {
            return Ok(());
        };
        if compute.recomputing.get() {
            return Err(Error::RecomputeInProgress);
        }
        if let Some(upstream) = self.inner.nodes.upstream() {
            upstream.refresh()?;
        }
        self.run_pass(compute)
    }

    /// Brings a computed layer up to date. A no-op on source trees and
    /// inside a running pass.
    pub(crate) fn refresh(&self) -> Result<()> {
        let Some(compute) = &self.inner.compute else {
            return Ok(());
        };
        if compute.recomputing.get() {
            return Ok(());
        }
        if let Some(upstream) = self.inner.nodes.upstream() {
            upstream.refresh()?;
        }
        if !compute.dirty.get() {
            let stale = compute.dependencies.borrow().iter().any(Dependency::is_stale);
            if !stale {
                return Ok(());
            }
            self.trace_invalidate(self.layer_id(), InvalidateCause::State);
        }
        self.run_pass(compute)
    }

    fn run_pass(&self, compute: &Compute) -> Result<()> {
        compute.recomputing.set(true);
        let _guard = PassGuard(&compute.recomputing);

        let pass = compute.passes.get() + 1;
        compute.passes.set(pass);
        let layer = self.layer_id().get();
        self.with_tracer(|t| {
            t.recompute_begin(&RecomputeBeginEvent {
                layer,
                pass,
                at: Revision::next(),
            });
        });

        let outcome = self.pass_body(compute);
        let ok = outcome.is_ok();
        let dependencies = outcome.as_ref().map_or(0, |deps| count_u32(deps.len()));
        let result = match outcome {
            Ok(deps) => {
                *compute.dependencies.borrow_mut() = deps;
                compute.dirty.set(false);
                self.touch();
                Ok(())
            }
            Err(err) => {
                compute.dirty.set(true);
                Err(err)
            }
        };

        self.with_tracer(|t| {
            t.recompute_end(&RecomputeEndEvent {
                layer,
                pass,
                dependencies,
                ok,
                at: Revision::next(),
            });
        });
        if !ok {
            self.trace_invalidate(self.layer_id(), InvalidateCause::Failed);
        }
        result
    }

    /// Clears the overlay, rebuilds the index, and runs the function.
    /// Returns the captured dependencies.
    fn pass_body(&self, compute: &Compute) -> Result<Vec<Dependency>> {
        self.inner.nodes.clear();
        let upstream_root = self
            .inner
            .nodes
            .upstream()
            .and_then(|up| up.inner.index.borrow().root());
        let Some(root) = upstream_root else {
            self.inner.index.borrow_mut().dispose();
            return Ok(Vec::new());
        };

        let walk = self.walk(root)?;
        self.inner.index.borrow_mut().rebuild(&walk);
        let handle = self.handle_at(root).ok_or(Error::NodeNotFound(root))?;

        let tracked = Tracked::new(&compute.state);
        let recompute_fn = Rc::clone(&compute.recompute_fn);
        recompute_fn(&tracked, &handle)?;
        Ok(tracked.into_dependencies())
    }

    /// Marks this layer dirty because `origin` changed, cascading to its own
    /// dependents the first time.
    pub(super) fn mark_dirty(&self, origin: LayerId) {
        let Some(compute) = &self.inner.compute else {
            return;
        };
        if compute.dirty.replace(true) {
            return;
        }
        self.trace_invalidate(origin, InvalidateCause::Upstream);
        self.invalidate_dependents();
    }

    fn trace_invalidate(&self, origin: LayerId, cause: InvalidateCause) {
        let layer = self.layer_id().get();
        self.with_tracer(|t| {
            t.invalidate(&InvalidateEvent {
                layer,
                origin: origin.get(),
                cause,
                at: Revision::next(),
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use core::cell::Cell;

    use super::*;
    use crate::node::NodeSpec;
    use crate::tree::ChildIndex;
    use crate::value::Value;

    fn two_level() -> Tree {
        Tree::source_from(
            &NodeSpec::new("root").with_children([NodeSpec::new("a"), NodeSpec::new("b")]),
        )
    }

    #[test]
    fn recompute_on_create_runs_eagerly() {
        let source = two_level();
        let config = ComputedConfig {
            recompute_on_create: true,
            ..ComputedConfig::default()
        };
        let tree = Tree::computed_with(&source, State::new(), |_, _| Ok(()), config).unwrap();
        assert_eq!(tree.recompute_count(), 1);
        assert!(!tree.needs_recompute());
    }

    #[test]
    fn failed_pass_stays_dirty() {
        let source = two_level();
        let state = State::new();
        state.set("fail", true);
        let tree = Tree::computed(&source, state.clone(), |s, _| {
            if s.get("fail") == Some(Value::Bool(true)) {
                Err(Error::InvalidMutation("refused".to_string()))
            } else {
                Ok(())
            }
        });

        assert_eq!(
            tree.root().unwrap_err(),
            Error::InvalidMutation("refused".to_string())
        );
        assert!(tree.needs_recompute());

        state.set("fail", false);
        assert!(tree.root().is_ok());
        assert!(!tree.needs_recompute());
        assert_eq!(tree.recompute_count(), 2);
    }

    #[test]
    fn recompute_inside_pass_is_rejected() {
        let source = two_level();
        let seen = Rc::new(Cell::new(None));
        let out = Rc::clone(&seen);
        let tree = Tree::computed(&source, State::new(), move |_, root| {
            out.set(Some(root.tree().recompute()));
            Ok(())
        });
        let _ = tree.root().unwrap();
        assert_eq!(seen.take(), Some(Err(Error::RecomputeInProgress)));
        assert!(!tree.recomputing_for_tests());
    }

    #[test]
    fn forced_recompute_runs_even_when_clean() {
        let source = two_level();
        let tree = Tree::computed(&source, State::new(), |_, _| Ok(()));
        let _ = tree.root().unwrap();
        tree.recompute().unwrap();
        assert_eq!(tree.recompute_count(), 2);
        assert!(Tree::source().recompute().is_ok());
    }

    #[test]
    fn function_can_add_nodes_in_its_layer() {
        let source = two_level();
        let tree = Tree::computed(&source, State::new(), |_, root| {
            root.add_child(crate::node::Node::new("extra"), ChildIndex::Append)?;
            Ok(())
        });
        let root = tree.root().unwrap();
        let children = root.children().unwrap();
        assert_eq!(children.len(), 3);
        let extra = children.get(2).unwrap();
        assert_eq!(extra.id().layer(), tree.layer_id());
        assert_eq!(source.root().unwrap().children().unwrap().len(), 2);

        // The added node is discarded by the next pass and recreated.
        tree.recompute().unwrap();
        assert!(extra.is_stale());
        assert_eq!(tree.root().unwrap().children().unwrap().len(), 3);
    }

    #[test]
    fn empty_upstream_skips_the_function() {
        let source = Tree::source();
        let called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&called);
        let tree = Tree::computed(&source, State::new(), move |_, _| {
            flag.set(true);
            Ok(())
        });
        assert_eq!(tree.root().unwrap_err(), Error::RootNotSet);
        assert!(!called.get());

        source.init(crate::node::Node::new("late")).unwrap();
        assert_eq!(tree.root().unwrap().name().unwrap().as_deref(), Some("late"));
        assert!(called.get());
    }

    impl Tree {
        fn recomputing_for_tests(&self) -> bool {
            self.inner
                .compute
                .as_ref()
                .is_some_and(|c| c.recomputing.get())
        }
    }
}
