// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copy-on-write overlay over a source layer.
//!
//! An [`OverlayStore`] shadows a subset of source nodes without mutating the
//! source. It holds three kinds of bookkeeping:
//!
//! - **changes**: a [`ChangeSet`] per overridden source id,
//! - **added**: nodes created directly in the overlay, in a [`NodeStore`]
//!   with its own [`LayerId`](crate::node::LayerId),
//! - **deleted**: source ids hidden by the overlay.
//!
//! Resolution precedence is *added* > *overwritten copy* > *source*, and a
//! deleted id resolves to nothing.
//!
//! # Materialization
//!
//! Overwritten nodes are served from a cached copy. On each resolution the
//! cache is rebuilt when the source node's revision moved, and otherwise
//! brought up to date by diffing the change set it was built from against
//! the current one ([`diff`](crate::change::diff)). An overlay with N edits
//! to one node therefore does O(1) work per additional edit. A cache entry
//! exists only while its change set is non-empty.

mod store;

pub use store::OverlayStore;

/// Provenance of a node resolved through an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlayType {
    /// Untouched source node.
    Src,
    /// Source node with overlay changes.
    Overwritten,
    /// Node created in the overlay itself.
    Added,
}

/// How cached copies are brought up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PatchStrategy {
    /// Diff the last applied change set against the current one and patch
    /// the cached copy.
    #[default]
    Incremental,
    /// Copy the source node and apply every change on each refresh.
    Rebuild,
}

/// Overlay configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayConfig {
    /// How cached copies are refreshed.
    pub patching: PatchStrategy,
}
