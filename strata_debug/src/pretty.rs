// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Revision
//! stamps are printed as `r<n>`.

use std::io::Write;

use strata_core::trace::{
    InvalidateCause, InvalidateEvent, MaterializeEvent, MaterializeKind, RecomputeBeginEvent,
    RecomputeEndEvent, StructureEvent, StructureKind, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn cause_name(cause: InvalidateCause) -> &'static str {
    match cause {
        InvalidateCause::Upstream => "upstream",
        InvalidateCause::State => "state",
        InvalidateCause::Failed => "failed",
    }
}

fn structure_name(kind: StructureKind) -> &'static str {
    match kind {
        StructureKind::Init => "init",
        StructureKind::Add => "add",
        StructureKind::Delete => "delete",
        StructureKind::Move => "move",
        StructureKind::Reorder => "reorder",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_recompute_begin(&mut self, e: &RecomputeBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[recompute:begin] layer={} pass={} at {:?}",
            e.layer, e.pass, e.at,
        );
    }

    fn on_recompute_end(&mut self, e: &RecomputeEndEvent) {
        let outcome = if e.ok { "ok" } else { "FAILED" };
        let _ = writeln!(
            self.writer,
            "[recompute:end] layer={} pass={} deps={} {outcome} at {:?}",
            e.layer, e.pass, e.dependencies, e.at,
        );
    }

    fn on_invalidate(&mut self, e: &InvalidateEvent) {
        let _ = writeln!(
            self.writer,
            "[invalidate] layer={} origin={} cause={} at {:?}",
            e.layer,
            e.origin,
            cause_name(e.cause),
            e.at,
        );
    }

    fn on_structure(&mut self, e: &StructureEvent) {
        let _ = writeln!(
            self.writer,
            "[structure:{}] layer={} node={} count={} at {:?}",
            structure_name(e.kind),
            e.layer,
            e.node_index,
            e.count,
            e.at,
        );
    }

    fn on_materialize(&mut self, e: &MaterializeEvent) {
        let kind = match e.kind {
            MaterializeKind::Fresh => "fresh",
            MaterializeKind::Incremental => "incremental",
            MaterializeKind::Dropped => "dropped",
        };
        let _ = writeln!(
            self.writer,
            "[materialize] layer={} node={} {kind}",
            e.layer, e.node_index,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use strata_core::node::NodeSpec;
    use strata_core::revision::Revision;
    use strata_core::state::State;
    use strata_core::tree::Tree;

    use super::*;

    #[test]
    fn pretty_print_structure() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_structure(&StructureEvent {
            layer: 1,
            kind: StructureKind::Delete,
            node_index: 3,
            count: 4,
            at: Revision::from_raw(9),
        });
        let output = String::from_utf8(sink.writer).unwrap();
        assert!(output.contains("[structure:delete]"));
        assert!(output.contains("count=4"));
        assert!(output.contains("at r9"));
    }

    #[test]
    fn pretty_print_failed_pass() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_recompute_end(&RecomputeEndEvent {
            layer: 2,
            pass: 3,
            dependencies: 0,
            ok: false,
            at: Revision::from_raw(1),
        });
        let output = String::from_utf8(sink.writer).unwrap();
        assert!(output.contains("pass=3"));
        assert!(output.contains("FAILED"));
    }

    #[test]
    fn pretty_print_live_tree() {
        let source = Tree::source_from(&NodeSpec::new("root"));
        let computed = Tree::computed(&source, State::new(), |_, root| root.set("seen", true));
        let sink = Rc::new(RefCell::new(PrettyPrintSink::with_writer(Vec::<u8>::new())));
        computed.set_trace_sink(Box::new(Rc::clone(&sink)));

        computed.root().unwrap();
        drop(computed.take_trace_sink());

        let sink = Rc::try_unwrap(sink).unwrap().into_inner();
        let output = String::from_utf8(sink.into_writer()).unwrap();
        let lines: Vec<_> = output
            .lines()
            .filter(|line| !line.starts_with("[materialize]"))
            .collect();
        assert_eq!(lines.len(), 2, "{output}");
        assert!(lines[0].starts_with("[recompute:begin]"));
        assert!(lines[1].starts_with("[recompute:end]"));
        assert!(lines[1].contains(" ok "));
    }
}
