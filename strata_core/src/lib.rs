// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layered, incrementally recomputed tree store.
//!
//! `strata_core` keeps a tree of records in a *source* layer and lets any
//! number of *computed* layers shadow it through copy-on-write overlays. A
//! computed layer is rebuilt by a caller-supplied function whenever the
//! layer below it, or the external [`State`](state::State) it read, has
//! changed. It is `no_std` compatible (with `alloc`) and stores nodes in
//! generational arenas addressed by [`NodeId`](node::NodeId).
//!
//! # Architecture
//!
//! ```text
//!   NodeStore (records)        ChangeSet ──► diff() ──► Patch
//!       │                          │                      │
//!       ▼                          ▼                      ▼
//!   Tree::source() ◄──────── OverlayStore (changes, added, deleted, copies)
//!       │                          │
//!       │ dependents               │ NodeRef: "current value of id X"
//!       ▼                          ▼
//!   Tree::computed(state, f) ──► TreeIndex ──► TreeHandle / NodeList
//!       ▲
//!       └── refresh on read: upstream dirty or State path rewritten
//! ```
//!
//! **[`node`]**: Node records, tree literals, and the per-layer arena store.
//!
//! **[`change`]**: Nested per-node change sets and the diff engine that turns
//! two change sets into the minimal patch between them.
//!
//! **[`overlay`]**: Copy-on-write overlay bookkeeping with lazily materialized,
//! incrementally patched node copies.
//!
//! **[`tree`]**: Source and computed tree layers, structural operations,
//! handles, and the recompute scheduler.
//!
//! **[`state`]**: External state with per-path revisions and dependency
//! capture.
//!
//! **[`dirty`]**: Dirty channels for derived structural caches via
//! `understory_dirty`.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Example
//!
//! ```
//! use strata_core::node::NodeSpec;
//! use strata_core::state::State;
//! use strata_core::tree::Tree;
//!
//! let source = Tree::source_from(
//!     &NodeSpec::new("Root").with_children([NodeSpec::new("A"), NodeSpec::new("B")]),
//! );
//! let state = State::new();
//! state.set("suffix", "!");
//!
//! let loud = Tree::computed(&source, state.clone(), |state, root| {
//!     let suffix = state.text("suffix").unwrap_or_default();
//!     for child in root.children()?.iter() {
//!         let name = child.name()?.unwrap_or_default();
//!         child.set("name", format!("{name}{suffix}"))?;
//!     }
//!     Ok(())
//! });
//!
//! let first = loud.root()?.children()?.get(0).unwrap();
//! assert_eq!(first.name()?.as_deref(), Some("A!"));
//!
//! state.set("suffix", "?");
//! assert_eq!(first.name()?.as_deref(), Some("A?"));
//! assert_eq!(first.previous()?.unwrap().name(), Some("A"));
//! # Ok::<(), strata_core::Error>(())
//! ```
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-node
//!   materialization events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod change;
pub mod dirty;
pub mod error;
pub mod node;
pub mod overlay;
pub mod revision;
pub mod state;
pub mod trace;
pub mod tree;
pub mod value;

pub use error::{Error, Result};
