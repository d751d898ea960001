// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events as
//! little-endian records, each stamped with the nanoseconds elapsed since
//! the recorder was created. The buffer is shared with any [`Recording`]
//! handle, so a sink can be boxed into a session and read from outside.
//! [`decode`] reads the bytes back as an iterator of [`Record`].
//!
//! Updated regions ([`on_updated_region`](TraceSink::on_updated_region))
//! store only the rect count.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use strata_core::descriptor::CompositableKind;
use strata_core::geometry::IntRect;
use strata_core::layer::LayerId;
use strata_core::trace::{
    CompositeEvent, DropReason, EditDroppedEvent, FrameSummary, ImageUpdateEvent, SwapEvent,
    SwapPolicy, TraceSink, TransactionEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TRANSACTION: u8 = 1;
const TAG_SWAP: u8 = 2;
const TAG_IMAGE_UPDATE: u8 = 3;
const TAG_EDIT_DROPPED: u8 = 4;
const TAG_COMPOSITE: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_UPDATED_REGION_COUNT: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug)]
pub struct RecorderSink {
    shared: Arc<Mutex<Vec<u8>>>,
    scratch: Vec<u8>,
    start: Instant,
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to the bytes a [`RecorderSink`] has written.
#[derive(Clone, Debug)]
pub struct Recording {
    shared: Arc<Mutex<Vec<u8>>>,
}

impl Recording {
    /// Copies out everything recorded so far.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.shared.lock().clone()
    }

    /// Number of bytes recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecorderSink {
    /// Creates an empty recorder. Timestamps count from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Vec::new())),
            scratch: Vec::new(),
            start: Instant::now(),
        }
    }

    /// A handle that can read the recording while the sink is in use.
    #[must_use]
    pub fn recording(&self) -> Recording {
        Recording {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Copies out everything recorded so far.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.shared.lock().clone()
    }

    // -- encoding helpers --------------------------------------------------

    fn begin(&mut self, tag: u8) {
        self.scratch.clear();
        self.scratch.push(tag);
        let elapsed = u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.write_u64(elapsed);
    }

    fn commit(&mut self) {
        self.shared.lock().extend_from_slice(&self.scratch);
    }

    fn write_u8(&mut self, v: u8) {
        self.scratch.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.scratch.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.scratch.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.scratch.extend_from_slice(&v.to_le_bytes());
    }

    fn write_layer(&mut self, layer: LayerId) {
        self.write_u32(layer.index());
        self.write_u32(layer.generation());
    }

    fn write_rect(&mut self, r: IntRect) {
        self.write_i32(r.x);
        self.write_i32(r.y);
        self.write_i32(r.width);
        self.write_i32(r.height);
    }

    fn write_reason(&mut self, reason: Option<DropReason>) {
        self.write_u8(match reason {
            None => 0,
            Some(DropReason::StaleLayer) => 1,
            Some(DropReason::NoCompositable) => 2,
            Some(DropReason::Incompatible) => 3,
            Some(DropReason::LockFailed) => 4,
            Some(DropReason::AllocationFailed) => 5,
        });
    }

    fn write_kind(&mut self, kind: CompositableKind) {
        self.write_u8(match kind {
            CompositableKind::ContentDirect => 0,
            CompositableKind::ContentTexture => 1,
            CompositableKind::ImageTexture => 2,
            CompositableKind::ImageShared => 3,
            CompositableKind::ImageYuv => 4,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_transaction(&mut self, e: &TransactionEvent) {
        self.begin(TAG_TRANSACTION);
        self.write_u64(e.sequence);
        self.write_u32(e.edits);
        self.write_u32(e.replies);
        self.write_u32(e.dropped);
        self.commit();
    }

    fn on_swap(&mut self, e: &SwapEvent) {
        self.begin(TAG_SWAP);
        self.write_u64(e.sequence);
        self.write_layer(e.layer);
        self.write_u8(match e.policy {
            SwapPolicy::Direct => 0,
            SwapPolicy::Texture => 1,
        });
        self.write_rect(e.updated_bounds);
        self.write_u8(u8::from(e.returned_back));
        self.write_u8(u8::from(e.reset));
        self.commit();
    }

    fn on_image_update(&mut self, e: &ImageUpdateEvent) {
        self.begin(TAG_IMAGE_UPDATE);
        self.write_u64(e.sequence);
        self.write_layer(e.layer);
        self.write_kind(e.kind);
        self.write_u8(u8::from(e.returned_previous));
        self.commit();
    }

    fn on_edit_dropped(&mut self, e: &EditDroppedEvent) {
        self.begin(TAG_EDIT_DROPPED);
        self.write_u64(e.sequence);
        self.write_layer(e.layer);
        self.write_reason(Some(e.reason));
        self.commit();
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        self.begin(TAG_COMPOSITE);
        self.write_u64(e.frame_index);
        self.write_layer(e.layer);
        self.write_u32(e.quads);
        self.write_reason(e.skipped);
        self.commit();
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.begin(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u32(s.layers_drawn);
        self.write_u32(s.layers_skipped);
        self.write_u32(s.quads);
        self.commit();
    }

    fn on_updated_region(&mut self, sequence: u64, layer: LayerId, rects: &[IntRect]) {
        self.begin(TAG_UPDATED_REGION_COUNT);
        self.write_u64(sequence);
        self.write_layer(layer);
        self.write_u32(u32::try_from(rects.len()).unwrap_or(u32::MAX));
        self.commit();
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`TransactionEvent`].
    Transaction(TransactionEvent),
    /// A [`SwapEvent`].
    Swap(SwapEvent),
    /// An [`ImageUpdateEvent`].
    ImageUpdate(ImageUpdateEvent),
    /// An [`EditDroppedEvent`].
    EditDropped(EditDroppedEvent),
    /// A [`CompositeEvent`].
    Composite(CompositeEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Updated-region rect count for a painted layer.
    UpdatedRegionCount {
        /// Transaction counter.
        sequence: u64,
        /// The layer.
        layer: LayerId,
        /// Number of rects.
        count: u32,
    },
}

/// One decoded record.
#[derive(Clone, Copy, Debug)]
pub struct Record {
    /// Nanoseconds between the recorder's creation and the event.
    pub elapsed_nanos: u64,
    /// The event.
    pub event: RecordedEvent,
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`Record`]s. Iteration stops at the first truncated or unknown record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded records.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|b| b != 0)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_layer(&mut self) -> Option<LayerId> {
        let idx = self.read_u32()?;
        let generation = self.read_u32()?;
        Some(LayerId::from_raw(idx, generation))
    }

    fn read_rect(&mut self) -> Option<IntRect> {
        Some(IntRect::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        ))
    }

    fn read_reason(&mut self) -> Option<Option<DropReason>> {
        Some(match self.read_u8()? {
            0 => None,
            1 => Some(DropReason::StaleLayer),
            2 => Some(DropReason::NoCompositable),
            3 => Some(DropReason::Incompatible),
            4 => Some(DropReason::LockFailed),
            5 => Some(DropReason::AllocationFailed),
            _ => return None,
        })
    }

    fn read_kind(&mut self) -> Option<CompositableKind> {
        Some(match self.read_u8()? {
            0 => CompositableKind::ContentDirect,
            1 => CompositableKind::ContentTexture,
            2 => CompositableKind::ImageTexture,
            3 => CompositableKind::ImageShared,
            4 => CompositableKind::ImageYuv,
            _ => return None,
        })
    }

    fn decode_transaction(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Transaction(TransactionEvent {
            sequence: self.read_u64()?,
            edits: self.read_u32()?,
            replies: self.read_u32()?,
            dropped: self.read_u32()?,
        }))
    }

    fn decode_swap(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Swap(SwapEvent {
            sequence: self.read_u64()?,
            layer: self.read_layer()?,
            policy: match self.read_u8()? {
                0 => SwapPolicy::Direct,
                _ => SwapPolicy::Texture,
            },
            updated_bounds: self.read_rect()?,
            returned_back: self.read_bool()?,
            reset: self.read_bool()?,
        }))
    }

    fn decode_image_update(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ImageUpdate(ImageUpdateEvent {
            sequence: self.read_u64()?,
            layer: self.read_layer()?,
            kind: self.read_kind()?,
            returned_previous: self.read_bool()?,
        }))
    }

    fn decode_edit_dropped(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EditDropped(EditDroppedEvent {
            sequence: self.read_u64()?,
            layer: self.read_layer()?,
            reason: self.read_reason()??,
        }))
    }

    fn decode_composite(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Composite(CompositeEvent {
            frame_index: self.read_u64()?,
            layer: self.read_layer()?,
            quads: self.read_u32()?,
            skipped: self.read_reason()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            layers_drawn: self.read_u32()?,
            layers_skipped: self.read_u32()?,
            quads: self.read_u32()?,
        }))
    }

    fn decode_updated_region_count(&mut self) -> Option<RecordedEvent> {
        let sequence = self.read_u64()?;
        let layer = self.read_layer()?;
        let count = self.read_u32()?;
        Some(RecordedEvent::UpdatedRegionCount {
            sequence,
            layer,
            count,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let elapsed_nanos = self.read_u64()?;
        let event = match tag {
            TAG_TRANSACTION => self.decode_transaction(),
            TAG_SWAP => self.decode_swap(),
            TAG_IMAGE_UPDATE => self.decode_image_update(),
            TAG_EDIT_DROPPED => self.decode_edit_dropped(),
            TAG_COMPOSITE => self.decode_composite(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_UPDATED_REGION_COUNT => self.decode_updated_region_count(),
            _ => None,
        }?;
        Some(Record {
            elapsed_nanos,
            event,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> LayerId {
        LayerId::from_raw(3, 2)
    }

    fn events(rec: &RecorderSink) -> Vec<RecordedEvent> {
        decode(&rec.bytes()).map(|r| r.event).collect()
    }

    #[test]
    fn swap_keeps_every_field() {
        let mut rec = RecorderSink::new();
        rec.on_swap(&SwapEvent {
            sequence: 9,
            layer: layer(),
            policy: SwapPolicy::Texture,
            updated_bounds: IntRect::new(-4, 5, 60, 70),
            returned_back: true,
            reset: false,
        });
        match events(&rec).as_slice() {
            [RecordedEvent::Swap(e)] => {
                assert_eq!(e.sequence, 9, "sequence");
                assert_eq!(e.layer, layer(), "layer");
                assert_eq!(e.policy, SwapPolicy::Texture, "policy");
                assert_eq!(e.updated_bounds, IntRect::new(-4, 5, 60, 70), "bounds");
                assert!(e.returned_back && !e.reset, "flags");
            }
            other => panic!("expected one Swap, got {other:?}"),
        }
    }

    #[test]
    fn composite_distinguishes_skipped_from_drawn() {
        let mut rec = RecorderSink::new();
        for skipped in [None, Some(DropReason::LockFailed)] {
            rec.on_composite(&CompositeEvent {
                frame_index: 1,
                layer: layer(),
                quads: u32::from(skipped.is_none()),
                skipped,
            });
        }
        let skipped: Vec<_> = events(&rec)
            .into_iter()
            .map(|e| match e {
                RecordedEvent::Composite(c) => c.skipped,
                other => panic!("expected Composite, got {other:?}"),
            })
            .collect();
        assert_eq!(skipped, [None, Some(DropReason::LockFailed)], "reasons kept");
    }

    #[test]
    fn mixed_events_decode_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_transaction(&TransactionEvent {
            sequence: 1,
            edits: 3,
            replies: 1,
            dropped: 1,
        });
        rec.on_edit_dropped(&EditDroppedEvent {
            sequence: 1,
            layer: layer(),
            reason: DropReason::StaleLayer,
        });
        rec.on_image_update(&ImageUpdateEvent {
            sequence: 2,
            layer: layer(),
            kind: CompositableKind::ImageYuv,
            returned_previous: true,
        });
        rec.on_updated_region(2, layer(), &[IntRect::new(0, 0, 1, 1); 4]);
        rec.on_frame_summary(&FrameSummary {
            frame_index: 0,
            layers_drawn: 1,
            layers_skipped: 0,
            quads: 4,
        });

        let records: Vec<_> = decode(&rec.bytes()).collect();
        assert_eq!(records.len(), 5, "all events decoded");
        assert!(
            records.windows(2).all(|w| w[0].elapsed_nanos <= w[1].elapsed_nanos),
            "timestamps are monotonic"
        );
        assert!(matches!(records[0].event, RecordedEvent::Transaction(_)), "transaction");
        assert!(
            matches!(
                records[1].event,
                RecordedEvent::EditDropped(EditDroppedEvent {
                    reason: DropReason::StaleLayer,
                    ..
                })
            ),
            "dropped edit"
        );
        assert!(matches!(records[2].event, RecordedEvent::ImageUpdate(_)), "image update");
        assert!(
            matches!(records[3].event, RecordedEvent::UpdatedRegionCount { count: 4, .. }),
            "rect count only"
        );
        assert!(matches!(records[4].event, RecordedEvent::FrameSummary(_)), "summary");
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_frame_summary(&FrameSummary::default());
        rec.on_frame_summary(&FrameSummary::default());
        let mut bytes = rec.bytes();
        bytes.pop();
        assert_eq!(decode(&bytes).count(), 1, "partial record ignored");
        assert_eq!(decode(&[]).count(), 0, "empty recording");
    }

    #[test]
    fn recording_handle_sees_boxed_sink_output() {
        let rec = RecorderSink::new();
        let recording = rec.recording();
        let mut boxed: Box<dyn TraceSink + Send> = Box::new(rec);
        assert!(recording.is_empty(), "nothing yet");
        boxed.on_frame_summary(&FrameSummary::default());
        assert_eq!(decode(&recording.bytes()).count(), 1, "visible through the handle");
    }
}
