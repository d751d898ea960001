// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`] destination (default: stderr).

use std::io::Write;

use strata_core::geometry::IntRect;
use strata_core::layer::LayerId;
use strata_core::trace::{
    CompositeEvent, EditDroppedEvent, FrameSummary, ImageUpdateEvent, SwapEvent, SwapPolicy,
    TraceSink, TransactionEvent,
};

/// Writes human-readable trace lines to a [`Write`] destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
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
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn policy_name(policy: SwapPolicy) -> &'static str {
    match policy {
        SwapPolicy::Direct => "direct",
        SwapPolicy::Texture => "texture",
    }
}

fn rect(r: IntRect) -> String {
    format!("{}x{}+{}+{}", r.width, r.height, r.x, r.y)
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_transaction(&mut self, e: &TransactionEvent) {
        let _ = writeln!(
            self.writer,
            "[tx] seq={} edits={} replies={} dropped={}",
            e.sequence, e.edits, e.replies, e.dropped,
        );
    }

    fn on_swap(&mut self, e: &SwapEvent) {
        let _ = writeln!(
            self.writer,
            "[swap] seq={} {:?} {} updated={} back={} reset={}",
            e.sequence,
            e.layer,
            policy_name(e.policy),
            rect(e.updated_bounds),
            if e.returned_back { "returned" } else { "kept" },
            e.reset,
        );
    }

    fn on_image_update(&mut self, e: &ImageUpdateEvent) {
        let _ = writeln!(
            self.writer,
            "[image] seq={} {:?} {:?} previous={}",
            e.sequence,
            e.layer,
            e.kind,
            if e.returned_previous { "returned" } else { "none" },
        );
    }

    fn on_edit_dropped(&mut self, e: &EditDroppedEvent) {
        let _ = writeln!(
            self.writer,
            "[dropped] seq={} {:?} reason={:?}",
            e.sequence, e.layer, e.reason,
        );
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        let _ = match e.skipped {
            Some(reason) => writeln!(
                self.writer,
                "[composite] frame={} {:?} SKIPPED {reason:?}",
                e.frame_index, e.layer,
            ),
            None => writeln!(
                self.writer,
                "[composite] frame={} {:?} quads={}",
                e.frame_index, e.layer, e.quads,
            ),
        };
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} drawn={} skipped={} quads={}",
            s.frame_index, s.layers_drawn, s.layers_skipped, s.quads,
        );
    }

    fn on_updated_region(&mut self, sequence: u64, layer: LayerId, rects: &[IntRect]) {
        let _ = writeln!(
            self.writer,
            "[region] seq={sequence} {layer:?} rects={}",
            rects.len(),
        );
    }
}
