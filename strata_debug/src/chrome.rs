// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//! Per-layer events are placed on a track per layer index.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Frame summaries become counter events.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for record in decode(bytes) {
        let ts = nanos_to_us(record.elapsed_nanos);
        let event = match record.event {
            RecordedEvent::Transaction(e) => json!({
                "ph": "i",
                "name": "Transaction",
                "cat": "Transport",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "p",
                "args": {
                    "sequence": e.sequence,
                    "edits": e.edits,
                    "replies": e.replies,
                    "dropped": e.dropped,
                }
            }),
            RecordedEvent::Swap(e) => json!({
                "ph": "i",
                "name": "Swap",
                "cat": "Transport",
                "ts": ts,
                "pid": 0,
                "tid": e.layer.index(),
                "s": "t",
                "args": {
                    "sequence": e.sequence,
                    "layer": format!("{:?}", e.layer),
                    "policy": format!("{:?}", e.policy),
                    "updated": [
                        e.updated_bounds.x,
                        e.updated_bounds.y,
                        e.updated_bounds.width,
                        e.updated_bounds.height,
                    ],
                    "returned_back": e.returned_back,
                    "reset": e.reset,
                }
            }),
            RecordedEvent::ImageUpdate(e) => json!({
                "ph": "i",
                "name": "ImageUpdate",
                "cat": "Transport",
                "ts": ts,
                "pid": 0,
                "tid": e.layer.index(),
                "s": "t",
                "args": {
                    "sequence": e.sequence,
                    "layer": format!("{:?}", e.layer),
                    "kind": format!("{:?}", e.kind),
                    "returned_previous": e.returned_previous,
                }
            }),
            RecordedEvent::EditDropped(e) => json!({
                "ph": "i",
                "name": "EditDropped",
                "cat": "Transport",
                "ts": ts,
                "pid": 0,
                "tid": e.layer.index(),
                "s": "t",
                "args": {
                    "sequence": e.sequence,
                    "layer": format!("{:?}", e.layer),
                    "reason": format!("{:?}", e.reason),
                }
            }),
            RecordedEvent::Composite(e) => json!({
                "ph": "i",
                "name": if e.skipped.is_some() { "Skipped" } else { "Composite" },
                "cat": "Composite",
                "ts": ts,
                "pid": 1,
                "tid": e.layer.index(),
                "s": "t",
                "args": {
                    "frame_index": e.frame_index,
                    "layer": format!("{:?}", e.layer),
                    "quads": e.quads,
                    "reason": e.skipped.map(|r| format!("{r:?}")),
                }
            }),
            RecordedEvent::FrameSummary(s) => json!({
                "ph": "C",
                "name": "Frame",
                "cat": "Summary",
                "ts": ts,
                "pid": 1,
                "tid": 0,
                "args": {
                    "drawn": s.layers_drawn,
                    "skipped": s.layers_skipped,
                    "quads": s.quads,
                }
            }),
            RecordedEvent::UpdatedRegionCount {
                sequence,
                layer,
                count,
            } => json!({
                "ph": "i",
                "name": "UpdatedRegion",
                "cat": "Rich",
                "ts": ts,
                "pid": 0,
                "tid": layer.index(),
                "s": "t",
                "args": {
                    "sequence": sequence,
                    "rects": count,
                }
            }),
        };
        events.push(event);
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use strata_core::geometry::IntRect;
    use strata_core::layer::LayerId;
    use strata_core::trace::{CompositeEvent, DropReason, FrameSummary, SwapEvent, SwapPolicy, TraceSink};

    use super::*;
    use crate::recorder::RecorderSink;

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        let layer = LayerId::from_raw(2, 0);
        rec.on_swap(&SwapEvent {
            sequence: 1,
            layer,
            policy: SwapPolicy::Direct,
            updated_bounds: IntRect::new(0, 0, 8, 8),
            returned_back: false,
            reset: false,
        });
        rec.on_composite(&CompositeEvent {
            frame_index: 0,
            layer,
            quads: 0,
            skipped: Some(DropReason::LockFailed),
        });
        rec.on_frame_summary(&FrameSummary {
            frame_index: 0,
            layers_drawn: 0,
            layers_skipped: 1,
            quads: 0,
        });

        let mut out = Vec::new();
        export(&rec.bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 3, "one object per event");

        assert_eq!(parsed[0]["name"], "Swap", "swap first");
        assert_eq!(parsed[0]["tid"], 2, "layer track");
        assert_eq!(parsed[0]["args"]["updated"], json!([0, 0, 8, 8]), "bounds");

        assert_eq!(parsed[1]["name"], "Skipped", "skipped composite");
        assert_eq!(parsed[1]["args"]["reason"], "LockFailed", "reason");

        assert_eq!(parsed[2]["ph"], "C", "summary is a counter");
        assert_eq!(parsed[2]["args"]["skipped"], 1, "counter value");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty(), "nothing recorded");
    }
}
