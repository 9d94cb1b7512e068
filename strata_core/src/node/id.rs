// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer and node identity types.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

static NEXT_LAYER: AtomicU32 = AtomicU32::new(0);

/// Identifies one [`NodeStore`](super::NodeStore) and therefore the tree
/// layer that owns it.
///
/// Every id minted by a store carries its layer, so nodes added inside a
/// computed layer can never collide with ids of the source below it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub(crate) u32);

impl LayerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LAYER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw layer number (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

/// A handle to a node in a [`NodeStore`](super::NodeStore).
///
/// Contains the owning layer, a slot index, and a generation counter so that
/// ids of deleted nodes are never handed out again, even when the slot is
/// recycled.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub(crate) layer: LayerId,
    /// Slot index into the store's arrays.
    pub(crate) idx: u32,
    /// Generation counter; must match the store's generation for this slot.
    pub(crate) generation: u32,
}

impl NodeId {
    /// Returns the layer whose store minted this id.
    #[inline]
    #[must_use]
    pub const fn layer(self) -> LayerId {
        self.layer
    }

    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeId({}:{}@gen{})",
            self.layer.0, self.idx, self.generation
        )
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.layer.0, self.idx, self.generation)
    }
}
