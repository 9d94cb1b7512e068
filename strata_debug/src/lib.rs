// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, Chrome trace export, and JSON bridging for
//! strata diagnostics.
//!
//! This crate provides [`TraceSink`](strata_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//!
//! [`json`] converts tree snapshots and field values to `serde_json` values
//! and parses `{name, children: [...]}` literals into
//! [`NodeSpec`](strata_core::node::NodeSpec)s.

pub mod chrome;
pub mod json;
pub mod pretty;
pub mod recorder;
