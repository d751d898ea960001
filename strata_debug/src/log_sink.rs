// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forwarding trace events to the `log` facade.

use strata_core::geometry::IntRect;
use strata_core::layer::LayerId;
use strata_core::trace::{
    CompositeEvent, EditDroppedEvent, FrameSummary, ImageUpdateEvent, SwapEvent, TraceSink,
    TransactionEvent,
};

/// A [`TraceSink`] that logs every event under the `strata::trace` target.
///
/// Dropped edits and skipped layers log at `debug`, everything else at
/// `trace`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

const TARGET: &str = "strata::trace";

impl TraceSink for LogSink {
    fn on_transaction(&mut self, e: &TransactionEvent) {
        log::trace!(
            target: TARGET,
            "transaction {}: {} edits, {} replies, {} dropped",
            e.sequence,
            e.edits,
            e.replies,
            e.dropped
        );
    }

    fn on_swap(&mut self, e: &SwapEvent) {
        log::trace!(
            target: TARGET,
            "{:?}: {:?} swap, updated {:?}, back returned: {}",
            e.layer,
            e.policy,
            e.updated_bounds,
            e.returned_back
        );
    }

    fn on_image_update(&mut self, e: &ImageUpdateEvent) {
        log::trace!(target: TARGET, "{:?}: {:?} image updated", e.layer, e.kind);
    }

    fn on_edit_dropped(&mut self, e: &EditDroppedEvent) {
        log::debug!(
            target: TARGET,
            "transaction {}: edit for {:?} dropped ({:?})",
            e.sequence,
            e.layer,
            e.reason
        );
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        if let Some(reason) = e.skipped {
            log::debug!(target: TARGET, "frame {}: {:?} skipped ({reason:?})", e.frame_index, e.layer);
        }
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        log::trace!(
            target: TARGET,
            "frame {}: {} drawn, {} skipped, {} quads",
            s.frame_index,
            s.layers_drawn,
            s.layers_skipped,
            s.quads
        );
    }

    fn on_updated_region(&mut self, sequence: u64, layer: LayerId, rects: &[IntRect]) {
        log::trace!(target: TARGET, "transaction {sequence}: {layer:?} updated {rects:?}");
    }
}
