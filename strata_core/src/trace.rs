// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for tree layers.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! tree layers call when they recompute, get invalidated, or change shape.
//! All method bodies default to no-ops, so implementing only the events you
//! care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Events carry raw layer and node numbers plus the [`Revision`] at which
//! they happened, which serves as a logical timestamp.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`MaterializeEvent`] and the
//!   corresponding `TraceSink` method.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::revision::Revision;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What caused a computed layer to be marked dirty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidateCause {
    /// A layer it is computed from changed.
    Upstream,
    /// A state path read by the last pass was written.
    State,
    /// A recompute pass failed; the layer stays dirty.
    Failed,
}

/// Which structural operation changed a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructureKind {
    /// A root was installed.
    Init,
    /// A child was added.
    Add,
    /// A subtree was deleted.
    Delete,
    /// A node moved to a new parent.
    Move,
    /// A node moved among its siblings.
    Reorder,
}

/// How an overlay produced the node it returned.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterializeKind {
    /// A full copy with every change applied.
    Fresh,
    /// An incremental patch on the cached copy.
    Incremental,
    /// The change set emptied and the cached copy was dropped.
    Dropped,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a computed layer starts a recompute pass.
#[derive(Clone, Copy, Debug)]
pub struct RecomputeBeginEvent {
    /// Raw layer number.
    pub layer: u32,
    /// Pass counter (1 for the first pass).
    pub pass: u64,
    /// When the pass started.
    pub at: Revision,
}

/// Emitted when a recompute pass finishes.
#[derive(Clone, Copy, Debug)]
pub struct RecomputeEndEvent {
    /// Raw layer number.
    pub layer: u32,
    /// Pass counter.
    pub pass: u64,
    /// Number of state dependencies captured by the pass.
    pub dependencies: u32,
    /// Whether the recompute function succeeded.
    pub ok: bool,
    /// When the pass ended.
    pub at: Revision,
}

/// Emitted when a computed layer is marked dirty.
#[derive(Clone, Copy, Debug)]
pub struct InvalidateEvent {
    /// Raw number of the layer that became dirty.
    pub layer: u32,
    /// Raw number of the layer whose change caused it.
    pub origin: u32,
    /// Why it became dirty.
    pub cause: InvalidateCause,
    /// When it happened.
    pub at: Revision,
}

/// Emitted after a structural operation.
#[derive(Clone, Copy, Debug)]
pub struct StructureEvent {
    /// Raw layer number.
    pub layer: u32,
    /// Which operation.
    pub kind: StructureKind,
    /// Raw slot index of the node operated on.
    pub node_index: u32,
    /// Nodes affected (deletions count the whole subtree).
    pub count: u32,
    /// When it happened.
    pub at: Revision,
}

/// A per-node overlay materialization record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct MaterializeEvent {
    /// Raw layer number of the overlay.
    pub layer: u32,
    /// Raw slot index of the node.
    pub node_index: u32,
    /// How the node was produced.
    pub kind: MaterializeKind,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from tree layers.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a recompute pass starts.
    fn on_recompute_begin(&mut self, e: &RecomputeBeginEvent) {
        _ = e;
    }

    /// Called when a recompute pass ends.
    fn on_recompute_end(&mut self, e: &RecomputeEndEvent) {
        _ = e;
    }

    /// Called when a computed layer is marked dirty.
    fn on_invalidate(&mut self, e: &InvalidateEvent) {
        _ = e;
    }

    /// Called after a structural operation.
    fn on_structure(&mut self, e: &StructureEvent) {
        _ = e;
    }

    /// Called when an overlay materializes a node (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_materialize(&mut self, e: &MaterializeEvent) {
        _ = e;
    }
}

/// Shared sinks, so a caller can keep reading a sink installed on a tree.
impl<S: TraceSink + ?Sized> TraceSink for Rc<RefCell<S>> {
    fn on_recompute_begin(&mut self, e: &RecomputeBeginEvent) {
        self.borrow_mut().on_recompute_begin(e);
    }

    fn on_recompute_end(&mut self, e: &RecomputeEndEvent) {
        self.borrow_mut().on_recompute_end(e);
    }

    fn on_invalidate(&mut self, e: &InvalidateEvent) {
        self.borrow_mut().on_invalidate(e);
    }

    fn on_structure(&mut self, e: &StructureEvent) {
        self.borrow_mut().on_structure(e);
    }

    #[cfg(feature = "trace-rich")]
    fn on_materialize(&mut self, e: &MaterializeEvent) {
        self.borrow_mut().on_materialize(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`RecomputeBeginEvent`].
    #[inline]
    pub fn recompute_begin(&mut self, e: &RecomputeBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_recompute_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RecomputeEndEvent`].
    #[inline]
    pub fn recompute_end(&mut self, e: &RecomputeEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_recompute_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`InvalidateEvent`].
    #[inline]
    pub fn invalidate(&mut self, e: &InvalidateEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_invalidate(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`StructureEvent`].
    #[inline]
    pub fn structure(&mut self, e: &StructureEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_structure(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`MaterializeEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn materialize(&mut self, e: &MaterializeEvent) {
        if let Some(s) = &mut self.sink {
            s.on_materialize(e);
        }
    }
}

/// Clamps a count into the `u32` range used by events.
pub(crate) fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
