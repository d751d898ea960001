// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for buffer transport and compositing.
//!
//! This module provides a [`TraceSink`] trait with one method per event the
//! compositor session emits while applying transactions and compositing
//! frames. All method bodies default to no-ops, so implementing only the
//! events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies.
//! - `trace-rich` (implies `trace`): gates per-rect updated-region events.

use crate::descriptor::CompositableKind;
use crate::geometry::IntRect;
use crate::layer::LayerId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a painted-content host answered a buffer update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapPolicy {
    /// Front and back traded places.
    Direct,
    /// The host copied into its own texture and handed the buffer back.
    Texture,
}

/// Why an edit or composite did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The layer was destroyed or its id is stale.
    StaleLayer,
    /// The layer has no compositable attached.
    NoCompositable,
    /// The payload did not match the attached compositable.
    Incompatible,
    /// A texture could not be locked.
    LockFailed,
    /// A GPU or shared-memory allocation failed.
    AllocationFailed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted after a transaction has been applied.
#[derive(Clone, Copy, Debug)]
pub struct TransactionEvent {
    /// Monotonic transaction counter.
    pub sequence: u64,
    /// Number of edits in the transaction.
    pub edits: u32,
    /// Number of replies produced.
    pub replies: u32,
    /// Number of edits dropped.
    pub dropped: u32,
}

/// Emitted when a painted-content host accepts a new front buffer.
#[derive(Clone, Copy, Debug)]
pub struct SwapEvent {
    /// Transaction counter.
    pub sequence: u64,
    /// The layer.
    pub layer: LayerId,
    /// Which host policy answered.
    pub policy: SwapPolicy,
    /// Bounds of the updated region.
    pub updated_bounds: IntRect,
    /// Whether a back buffer was handed to the client.
    pub returned_back: bool,
    /// Whether the host dropped its old front because the size changed.
    pub reset: bool,
}

/// Emitted when an image host accepts a new image.
#[derive(Clone, Copy, Debug)]
pub struct ImageUpdateEvent {
    /// Transaction counter.
    pub sequence: u64,
    /// The layer.
    pub layer: LayerId,
    /// Kind of the host.
    pub kind: CompositableKind,
    /// Whether the previous image was returned to the client.
    pub returned_previous: bool,
}

/// Emitted when an edit is ignored.
#[derive(Clone, Copy, Debug)]
pub struct EditDroppedEvent {
    /// Transaction counter.
    pub sequence: u64,
    /// The layer named by the edit.
    pub layer: LayerId,
    /// Why it was dropped.
    pub reason: DropReason,
}

/// Emitted once per layer per composited frame.
#[derive(Clone, Copy, Debug)]
pub struct CompositeEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// The layer.
    pub layer: LayerId,
    /// Number of quads drawn.
    pub quads: u32,
    /// Set when the layer drew nothing, with the reason.
    pub skipped: Option<DropReason>,
}

/// Per-frame compositing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Layers that drew at least one quad.
    pub layers_drawn: u32,
    /// Layers that drew nothing.
    pub layers_skipped: u32,
    /// Total quads drawn.
    pub quads: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the compositor session.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called after a transaction is applied.
    fn on_transaction(&mut self, e: &TransactionEvent) {
        _ = e;
    }

    /// Called when a painted-content host swaps buffers.
    fn on_swap(&mut self, e: &SwapEvent) {
        _ = e;
    }

    /// Called when an image host accepts an image.
    fn on_image_update(&mut self, e: &ImageUpdateEvent) {
        _ = e;
    }

    /// Called when an edit is dropped.
    fn on_edit_dropped(&mut self, e: &EditDroppedEvent) {
        _ = e;
    }

    /// Called after each layer is composited (or skipped).
    fn on_composite(&mut self, e: &CompositeEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with the updated region of a painted layer (requires
    /// `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_updated_region(&mut self, sequence: u64, layer: LayerId, rects: &[IntRect]) {
        _ = (sequence, layer, rects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:ident) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer for an optional sink.
    #[inline]
    #[must_use]
    pub fn from_option(sink: Option<&'a mut dyn TraceSink>) -> Self {
        match sink {
            Some(s) => Self::new(s),
            None => Self::none(),
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`TransactionEvent`].
    #[inline]
    pub fn transaction(&mut self, e: &TransactionEvent) {
        dispatch!(self, on_transaction, e);
    }

    /// Emits a [`SwapEvent`].
    #[inline]
    pub fn swap(&mut self, e: &SwapEvent) {
        dispatch!(self, on_swap, e);
    }

    /// Emits an [`ImageUpdateEvent`].
    #[inline]
    pub fn image_update(&mut self, e: &ImageUpdateEvent) {
        dispatch!(self, on_image_update, e);
    }

    /// Emits an [`EditDroppedEvent`].
    #[inline]
    pub fn edit_dropped(&mut self, e: &EditDroppedEvent) {
        dispatch!(self, on_edit_dropped, e);
    }

    /// Emits a [`CompositeEvent`].
    #[inline]
    pub fn composite(&mut self, e: &CompositeEvent) {
        dispatch!(self, on_composite, e);
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        dispatch!(self, on_frame_summary, s);
    }

    /// Emits an updated region (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn updated_region(&mut self, sequence: u64, layer: LayerId, rects: &[IntRect]) {
        if let Some(s) = &mut self.sink {
            s.on_updated_region(sequence, layer, rects);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Accumulates per-layer composite results into a [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    summary: FrameSummary,
}

impl FrameSummaryBuilder {
    /// Starts a summary for `frame_index`.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            summary: FrameSummary {
                frame_index,
                ..FrameSummary::default()
            },
        }
    }

    /// Records one layer's result.
    pub fn record(&mut self, e: &CompositeEvent) {
        if e.skipped.is_some() || e.quads == 0 {
            self.summary.layers_skipped += 1;
        } else {
            self.summary.layers_drawn += 1;
        }
        self.summary.quads += e.quads;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        self.summary
    }
}
