// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node data model and canonical storage.
//!
//! A *node* is a record of named fields plus an ordered list of child ids.
//! Each node has an identity ([`NodeId`]): a generational handle tagged with
//! the [`LayerId`] of the store that minted it, so ids are never reused and
//! ids from different layers never collide.
//!
//! [`NodeStore`] is plain CRUD over a slot arena. Tree-shape invariants live
//! one level up, in [`tree`](crate::tree).

mod id;
mod record;
mod store;

pub use id::{LayerId, NodeId};
pub use record::{CHILDREN, NAME, Node, NodeSpec};
pub use store::NodeStore;
