// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Strata has no wall clock: the `ts` of every event is its revision stamp,
//! so the timeline shows logical order. Each layer gets its own track
//! (`tid`). Materialization events carry no stamp and reuse the last one
//! seen.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Recompute passes become `B`/`E` duration pairs; everything else is an
/// instant event.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last_ts = 0_u64;

    for recorded in decode(bytes) {
        if let Some(at) = recorded.at() {
            last_ts = at.get();
        }
        match recorded {
            RecordedEvent::RecomputeBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": "Recompute",
                    "cat": "Recompute",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.layer,
                    "args": {
                        "pass": e.pass,
                    }
                }));
            }
            RecordedEvent::RecomputeEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Recompute",
                    "cat": "Recompute",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.layer,
                    "args": {
                        "pass": e.pass,
                        "dependencies": e.dependencies,
                        "ok": e.ok,
                    }
                }));
            }
            RecordedEvent::Invalidate(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Invalidate",
                    "cat": "Recompute",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.layer,
                    "s": "t",
                    "args": {
                        "origin": e.origin,
                        "cause": format!("{:?}", e.cause),
                    }
                }));
            }
            RecordedEvent::Structure(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.kind),
                    "cat": "Structure",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.layer,
                    "s": "t",
                    "args": {
                        "node": e.node_index,
                        "count": e.count,
                    }
                }));
            }
            RecordedEvent::Materialize(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Materialize",
                    "cat": "Rich",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.layer,
                    "s": "t",
                    "args": {
                        "node": e.node_index,
                        "kind": format!("{:?}", e.kind),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use strata_core::revision::Revision;
    use strata_core::trace::{
        MaterializeEvent, MaterializeKind, RecomputeBeginEvent, RecomputeEndEvent, StructureEvent,
        StructureKind, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_recompute_begin(&RecomputeBeginEvent {
            layer: 2,
            pass: 1,
            at: Revision::from_raw(10),
        });
        rec.on_materialize(&MaterializeEvent {
            layer: 2,
            node_index: 0,
            kind: MaterializeKind::Fresh,
        });
        rec.on_recompute_end(&RecomputeEndEvent {
            layer: 2,
            pass: 1,
            dependencies: 0,
            ok: true,
            at: Revision::from_raw(12),
        });
        rec.on_structure(&StructureEvent {
            layer: 1,
            kind: StructureKind::Delete,
            node_index: 4,
            count: 3,
            at: Revision::from_raw(15),
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 4);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "Recompute");
        assert_eq!(parsed[0]["tid"], 2);

        // Materialization reuses the last stamp.
        assert_eq!(parsed[1]["ph"], "i");
        assert_eq!(parsed[1]["ts"], 10);
        assert_eq!(parsed[1]["args"]["kind"], "Fresh");

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["ts"], 12);

        assert_eq!(parsed[3]["name"], "Delete");
        assert_eq!(parsed[3]["args"]["count"], 3);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
