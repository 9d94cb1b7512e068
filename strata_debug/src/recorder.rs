// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use strata_core::revision::Revision;
use strata_core::trace::{
    InvalidateCause, InvalidateEvent, MaterializeEvent, MaterializeKind, RecomputeBeginEvent,
    RecomputeEndEvent, StructureEvent, StructureKind, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_RECOMPUTE_BEGIN: u8 = 1;
const TAG_RECOMPUTE_END: u8 = 2;
const TAG_INVALIDATE: u8 = 3;
const TAG_STRUCTURE: u8 = 4;
const TAG_MATERIALIZE: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
///
/// Install it on a tree through a shared `Rc<RefCell<RecorderSink>>` to keep
/// access to the bytes.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Discards everything recorded so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_at(&mut self, at: Revision) {
        self.write_u64(at.get());
    }

    fn write_cause(&mut self, c: InvalidateCause) {
        self.write_u8(match c {
            InvalidateCause::Upstream => 0,
            InvalidateCause::State => 1,
            InvalidateCause::Failed => 2,
        });
    }

    fn write_structure_kind(&mut self, k: StructureKind) {
        self.write_u8(match k {
            StructureKind::Init => 0,
            StructureKind::Add => 1,
            StructureKind::Delete => 2,
            StructureKind::Move => 3,
            StructureKind::Reorder => 4,
        });
    }

    fn write_materialize_kind(&mut self, k: MaterializeKind) {
        self.write_u8(match k {
            MaterializeKind::Fresh => 0,
            MaterializeKind::Incremental => 1,
            MaterializeKind::Dropped => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_recompute_begin(&mut self, e: &RecomputeBeginEvent) {
        self.write_u8(TAG_RECOMPUTE_BEGIN);
        self.write_u32(e.layer);
        self.write_u64(e.pass);
        self.write_at(e.at);
    }

    fn on_recompute_end(&mut self, e: &RecomputeEndEvent) {
        self.write_u8(TAG_RECOMPUTE_END);
        self.write_u32(e.layer);
        self.write_u64(e.pass);
        self.write_u32(e.dependencies);
        self.write_u8(u8::from(e.ok));
        self.write_at(e.at);
    }

    fn on_invalidate(&mut self, e: &InvalidateEvent) {
        self.write_u8(TAG_INVALIDATE);
        self.write_u32(e.layer);
        self.write_u32(e.origin);
        self.write_cause(e.cause);
        self.write_at(e.at);
    }

    fn on_structure(&mut self, e: &StructureEvent) {
        self.write_u8(TAG_STRUCTURE);
        self.write_u32(e.layer);
        self.write_structure_kind(e.kind);
        self.write_u32(e.node_index);
        self.write_u32(e.count);
        self.write_at(e.at);
    }

    fn on_materialize(&mut self, e: &MaterializeEvent) {
        self.write_u8(TAG_MATERIALIZE);
        self.write_u32(e.layer);
        self.write_u32(e.node_index);
        self.write_materialize_kind(e.kind);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`RecomputeBeginEvent`].
    RecomputeBegin(RecomputeBeginEvent),
    /// A [`RecomputeEndEvent`].
    RecomputeEnd(RecomputeEndEvent),
    /// An [`InvalidateEvent`].
    Invalidate(InvalidateEvent),
    /// A [`StructureEvent`].
    Structure(StructureEvent),
    /// A [`MaterializeEvent`].
    Materialize(MaterializeEvent),
}

impl RecordedEvent {
    /// Returns the layer the event was emitted for.
    #[must_use]
    pub fn layer(&self) -> u32 {
        match self {
            Self::RecomputeBegin(e) => e.layer,
            Self::RecomputeEnd(e) => e.layer,
            Self::Invalidate(e) => e.layer,
            Self::Structure(e) => e.layer,
            Self::Materialize(e) => e.layer,
        }
    }

    /// Returns the revision stamp, if the event carries one.
    #[must_use]
    pub fn at(&self) -> Option<Revision> {
        match self {
            Self::RecomputeBegin(e) => Some(e.at),
            Self::RecomputeEnd(e) => Some(e.at),
            Self::Invalidate(e) => Some(e.at),
            Self::Structure(e) => Some(e.at),
            Self::Materialize(_) => None,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_at(&mut self) -> Option<Revision> {
        self.read_u64().map(Revision::from_raw)
    }

    fn read_cause(&mut self) -> Option<InvalidateCause> {
        Some(match self.read_u8()? {
            0 => InvalidateCause::Upstream,
            1 => InvalidateCause::State,
            _ => InvalidateCause::Failed,
        })
    }

    fn read_structure_kind(&mut self) -> Option<StructureKind> {
        Some(match self.read_u8()? {
            0 => StructureKind::Init,
            1 => StructureKind::Add,
            2 => StructureKind::Delete,
            3 => StructureKind::Move,
            _ => StructureKind::Reorder,
        })
    }

    fn read_materialize_kind(&mut self) -> Option<MaterializeKind> {
        Some(match self.read_u8()? {
            0 => MaterializeKind::Fresh,
            1 => MaterializeKind::Incremental,
            _ => MaterializeKind::Dropped,
        })
    }

    fn decode_recompute_begin(&mut self) -> Option<RecordedEvent> {
        let layer = self.read_u32()?;
        let pass = self.read_u64()?;
        let at = self.read_at()?;
        Some(RecordedEvent::RecomputeBegin(RecomputeBeginEvent {
            layer,
            pass,
            at,
        }))
    }

    fn decode_recompute_end(&mut self) -> Option<RecordedEvent> {
        let layer = self.read_u32()?;
        let pass = self.read_u64()?;
        let dependencies = self.read_u32()?;
        let ok = self.read_u8()? != 0;
        let at = self.read_at()?;
        Some(RecordedEvent::RecomputeEnd(RecomputeEndEvent {
            layer,
            pass,
            dependencies,
            ok,
            at,
        }))
    }

    fn decode_invalidate(&mut self) -> Option<RecordedEvent> {
        let layer = self.read_u32()?;
        let origin = self.read_u32()?;
        let cause = self.read_cause()?;
        let at = self.read_at()?;
        Some(RecordedEvent::Invalidate(InvalidateEvent {
            layer,
            origin,
            cause,
            at,
        }))
    }

    fn decode_structure(&mut self) -> Option<RecordedEvent> {
        let layer = self.read_u32()?;
        let kind = self.read_structure_kind()?;
        let node_index = self.read_u32()?;
        let count = self.read_u32()?;
        let at = self.read_at()?;
        Some(RecordedEvent::Structure(StructureEvent {
            layer,
            kind,
            node_index,
            count,
            at,
        }))
    }

    fn decode_materialize(&mut self) -> Option<RecordedEvent> {
        let layer = self.read_u32()?;
        let node_index = self.read_u32()?;
        let kind = self.read_materialize_kind()?;
        Some(RecordedEvent::Materialize(MaterializeEvent {
            layer,
            node_index,
            kind,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_RECOMPUTE_BEGIN => self.decode_recompute_begin(),
            TAG_RECOMPUTE_END => self.decode_recompute_end(),
            TAG_INVALIDATE => self.decode_invalidate(),
            TAG_STRUCTURE => self.decode_structure(),
            TAG_MATERIALIZE => self.decode_materialize(),
            _ => None, // unknown tag, stop
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use strata_core::node::{Node, NodeSpec};
    use strata_core::state::State;
    use strata_core::tree::{ChildIndex, Tree};

    use super::*;

    fn install(tree: &Tree) -> Rc<RefCell<RecorderSink>> {
        let sink = Rc::new(RefCell::new(RecorderSink::new()));
        tree.set_trace_sink(Box::new(Rc::clone(&sink)));
        sink
    }

    fn recorded(sink: &Rc<RefCell<RecorderSink>>) -> Vec<RecordedEvent> {
        decode(sink.borrow().as_bytes()).collect()
    }

    #[test]
    fn round_trip_recompute_end() {
        let mut rec = RecorderSink::new();
        rec.on_recompute_end(&RecomputeEndEvent {
            layer: 4,
            pass: 9,
            dependencies: 2,
            ok: false,
            at: Revision::from_raw(77),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::RecomputeEnd(e) => {
                assert_eq!(e.layer, 4);
                assert_eq!(e.pass, 9);
                assert_eq!(e.dependencies, 2);
                assert!(!e.ok);
                assert_eq!(e.at, Revision::from_raw(77));
            }
            other => panic!("expected RecomputeEnd, got {other:?}"),
        }
    }

    #[test]
    fn structural_operations_are_recorded() {
        let tree = Tree::source();
        let sink = install(&tree);
        let root = tree
            .init_from_tree(&NodeSpec::new("root").child(NodeSpec::new("a")))
            .unwrap();
        let b = root.add_child(Node::new("b"), ChildIndex::At(0)).unwrap();
        b.move_pos(1).unwrap();
        b.delete().unwrap();

        let kinds: Vec<_> = recorded(&sink)
            .into_iter()
            .map(|event| match event {
                RecordedEvent::Structure(e) => (e.kind, e.count),
                other => panic!("expected Structure, got {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            [
                (StructureKind::Init, 2),
                (StructureKind::Add, 1),
                (StructureKind::Reorder, 1),
                (StructureKind::Delete, 1),
            ]
        );
        assert!(
            recorded(&sink)
                .iter()
                .all(|e| e.layer() == tree.layer_id().get()),
            "every event names the source layer"
        );
    }

    #[test]
    fn recompute_passes_are_bracketed() {
        let source = Tree::source_from(&NodeSpec::new("root").child(NodeSpec::new("a")));
        let state = State::new();
        state.set("flag", true);
        let computed = Tree::computed(&source, state.clone(), |state, root| {
            let flag = state.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
            root.set("flag", flag)
        });
        let sink = install(&computed);

        computed.root().unwrap();
        state.set("flag", false);
        computed.root().unwrap();

        let events: Vec<_> = recorded(&sink)
            .into_iter()
            .filter(|e| !matches!(e, RecordedEvent::Materialize(_)))
            .collect();
        assert!(matches!(
            events[0],
            RecordedEvent::RecomputeBegin(RecomputeBeginEvent { pass: 1, .. })
        ));
        match &events[1] {
            RecordedEvent::RecomputeEnd(e) => {
                assert_eq!(e.pass, 1);
                assert_eq!(e.dependencies, 1);
                assert!(e.ok);
            }
            other => panic!("expected RecomputeEnd, got {other:?}"),
        }
        assert!(matches!(
            events[2],
            RecordedEvent::Invalidate(InvalidateEvent {
                cause: InvalidateCause::State,
                ..
            })
        ));
        assert!(matches!(
            events[3],
            RecordedEvent::RecomputeBegin(RecomputeBeginEvent { pass: 2, .. })
        ));

        let stamps: Vec<_> = events.iter().filter_map(RecordedEvent::at).collect();
        assert!(
            stamps.windows(2).all(|w| w[0] < w[1]),
            "revision stamps must increase"
        );
    }

    #[test]
    fn upstream_edits_invalidate_downstream() {
        let source = Tree::source_from(&NodeSpec::new("root"));
        let computed = Tree::computed(&source, State::new(), |_, _| Ok(()));
        computed.root().unwrap();
        let sink = install(&computed);

        source.root().unwrap().set("x", 1).unwrap();
        let events = recorded(&sink);
        match &events[..] {
            [RecordedEvent::Invalidate(e)] => {
                assert_eq!(e.cause, InvalidateCause::Upstream);
                assert_eq!(e.origin, source.layer_id().get());
                assert_eq!(e.layer, computed.layer_id().get());
            }
            other => panic!("expected one Invalidate, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_materialize(&MaterializeEvent {
            layer: 1,
            node_index: 2,
            kind: MaterializeKind::Incremental,
        });
        rec.on_materialize(&MaterializeEvent {
            layer: 1,
            node_index: 3,
            kind: MaterializeKind::Fresh,
        });
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            RecordedEvent::Materialize(MaterializeEvent {
                node_index: 2,
                kind: MaterializeKind::Incremental,
                ..
            })
        ));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }
}
