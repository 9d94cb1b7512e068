// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy shared by every layer of the store.
//!
//! All errors are synchronous and local. An operation that returns an error
//! has not mutated anything.

use alloc::string::String;

use crate::node::NodeId;

/// Errors returned by store, overlay, and tree operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A node that must exist could not be resolved.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    /// The tree was accessed before a root was established.
    #[error("tree root not set")]
    RootNotSet,
    /// The handle's node was deleted (or its subtree disposed).
    #[error("stale handle: {0:?}")]
    StaleHandle(NodeId),
    /// An attempt to write a field that is owned by the structural layer.
    #[error("direct access to `{0}` is not allowed, use the structural operations")]
    DirectInternalAccess(String),
    /// A child index was missing.
    #[error("child index is undefined")]
    UndefinedIndex,
    /// A child index was present but malformed.
    #[error("incorrect child index: {0}")]
    IncorrectIndex(String),
    /// The mutation is not valid for the current shape of the tree or layer.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),
    /// An overlay reverted a path the source node does not have.
    #[error("overlay for {id:?} reverts `{path}` which the source does not have")]
    MissingSourcePath {
        /// The node being patched.
        id: NodeId,
        /// Dotted form of the offending path.
        path: String,
    },
    /// A forced recompute was requested while a pass was already running.
    #[error("recompute already in progress")]
    RecomputeInProgress,
}

/// Shorthand for results carrying [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
