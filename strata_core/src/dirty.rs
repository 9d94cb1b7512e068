// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The tree index keeps per-node derived caches (descendant lists, heights,
//! ancestor chains) and invalidates them through [`understory_dirty`]. Each
//! channel represents an independent category of structural change.
//!
//! # Propagation semantics
//!
//! Both channels are marked with [`EagerPolicy`](understory_dirty::EagerPolicy)
//! but their dependency edges point in opposite directions:
//!
//! - [`SUBTREE`]: edges from parent to child (a parent depends on its
//!   children). Marking a node whose child list changed marks every
//!   ancestor, since their descendant lists and heights are now wrong.
//! - [`ANCESTRY`]: edges from child to parent. Marking a node that moved
//!   marks every node below it, since their ancestor chains are now wrong.
//!
//! # Consumption
//!
//! The index drains both channels before answering a derived query and
//! drops the cached values of every drained node.

use understory_dirty::Channel;

/// Child list changed: descendant lists and heights of ancestors are stale.
pub const SUBTREE: Channel = Channel::new(0);

/// Parent changed: ancestor chains of descendants are stale.
pub const ANCESTRY: Channel = Channel::new(1);
