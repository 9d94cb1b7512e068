// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide version stamps.
//!
//! Every mutation in any layer takes a fresh [`Revision`]. Consumers cache
//! the last revision they observed and compare it on the next access instead
//! of intercepting reads and writes.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(1);

/// A monotonic version stamp.
///
/// Revisions are unique: two distinct mutations never share one, so equality
/// of a cached revision with the current one proves nothing changed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub(crate) u64);

impl Revision {
    /// The revision older than every stamp handed out by [`Revision::next`].
    pub const ZERO: Self = Self(0);

    /// Takes a fresh stamp from the global clock.
    #[must_use]
    pub fn next() -> Self {
        Self(CLOCK.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuilds a revision from a raw stamp, for decoding recorded
    /// diagnostics. The result does not advance the clock.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw stamp value (for diagnostics).
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}
