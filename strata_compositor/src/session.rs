// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor's side of one connection.
//!
//! A [`CompositorSession`] mirrors the content side's layer table, applies
//! incoming [`Transaction`]s to per-layer hosts, and composites every layer
//! in creation order. It owns the recycle bin shared by YCbCr hosts and the
//! task queue that GPU deletions from other threads are posted to.
//!
//! Edits follow disconnection semantics: anything naming a destroyed or
//! stale layer is dropped on arrival, and the shared-memory buffers it
//! carried are destroyed since no client will take them back. Edits that
//! reach a live layer but do not fit its host are answered with the payload
//! handed back.

use std::sync::Arc;

use strata_core::descriptor::{
    CompositableKind, SharedImage, SurfaceDescriptor, TextureIdentifier, ThebesBuffer,
};
use strata_core::geometry::IntRect;
use strata_core::layer::LayerId;
use strata_core::protocol::{Edit, EditReply, LayerAttributes, ThebesSwap, Transaction};
use strata_core::region::IntRegion;
use strata_core::trace::{
    CompositeEvent, DropReason, EditDroppedEvent, FrameSummary, FrameSummaryBuilder,
    ImageUpdateEvent, SwapEvent, TraceSink, Tracer, TransactionEvent,
};
use strata_surface::handoff::TaskQueue;
use strata_surface::pool::SurfacePool;

use crate::channel::CompositorEndpoint;
use crate::compositor::Compositor;
use crate::content_host::ContentHost;
use crate::error::ChannelError;
use crate::gpu::GpuContext;
use crate::image_host::{ImageHost, ImageUpdateOutcome};
use crate::recycle_bin::TextureRecycleBin;

/// Session construction options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reuse YCbCr plane textures across frames.
    pub recycle_textures: bool,
    /// Cap on cached textures per plane purpose.
    pub max_recycled_per_purpose: usize,
}

impl SessionConfig {
    /// Default for [`max_recycled_per_purpose`](Self::max_recycled_per_purpose).
    pub const DEFAULT_MAX_RECYCLED: usize = 4;
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recycle_textures: true,
            max_recycled_per_purpose: Self::DEFAULT_MAX_RECYCLED,
        }
    }
}

/// Running totals over a session's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Frames composited.
    pub frames: u64,
    /// Transactions applied.
    pub transactions: u64,
    /// Edits that took effect.
    pub edits_applied: u64,
    /// Edits dropped.
    pub edits_dropped: u64,
    /// Quads drawn.
    pub quads: u64,
    /// Layer-frames that drew nothing.
    pub layers_skipped: u64,
}

#[derive(Debug)]
enum Host {
    Content(ContentHost),
    Image(ImageHost),
}

#[derive(Debug)]
struct LayerSlot {
    id: LayerId,
    attributes: LayerAttributes,
    host: Option<Host>,
}

/// Applies transactions and composites layers for one content connection.
pub struct CompositorSession<C: Compositor> {
    compositor: C,
    context: Arc<dyn GpuContext>,
    pool: Arc<SurfacePool>,
    tasks: TaskQueue,
    recycle_bin: Option<Arc<TextureRecycleBin>>,
    layers: Vec<Option<LayerSlot>>,
    order: Vec<LayerId>,
    sequence: u64,
    frame_index: u64,
    stats: CompositeStats,
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl<C: Compositor> core::fmt::Debug for CompositorSession<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompositorSession")
            .field("layers", &self.order.len())
            .field("sequence", &self.sequence)
            .field("frame_index", &self.frame_index)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<C: Compositor> CompositorSession<C> {
    /// Creates a session drawing through `compositor`.
    ///
    /// `tasks` must be the queue of the thread that owns the compositor's
    /// context; the session drains it on every composite.
    pub fn new(compositor: C, pool: Arc<SurfacePool>, tasks: TaskQueue, config: SessionConfig) -> Self {
        let context = compositor.context();
        debug_assert_eq!(
            context.owner().owner(),
            tasks.owner(),
            "session task queue must belong to the context's owner thread"
        );
        let recycle_bin = config
            .recycle_textures
            .then(|| Arc::new(TextureRecycleBin::new(config.max_recycled_per_purpose)));
        Self {
            compositor,
            context,
            pool,
            tasks,
            recycle_bin,
            layers: Vec::new(),
            order: Vec::new(),
            sequence: 0,
            frame_index: 0,
            stats: CompositeStats::default(),
            sink: None,
        }
    }

    /// Routes trace events to `sink`.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
        self.sink = Some(sink);
    }

    /// Removes and returns the trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink + Send>> {
        self.sink.take()
    }

    /// The compositor.
    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    /// The compositor, mutably.
    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    /// The shared-memory pool buffers arrive from.
    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    /// The YCbCr recycle bin, if enabled.
    pub fn recycle_bin(&self) -> Option<&Arc<TextureRecycleBin>> {
        self.recycle_bin.as_ref()
    }

    /// Lifetime totals.
    pub fn stats(&self) -> CompositeStats {
        self.stats
    }

    /// Number of live layers.
    pub fn layer_count(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if `layer` is live in this session.
    pub fn is_alive(&self, layer: LayerId) -> bool {
        self.slot(layer).is_some()
    }

    /// Current attributes of `layer`.
    pub fn attributes(&self, layer: LayerId) -> Option<&LayerAttributes> {
        self.slot(layer).map(|s| &s.attributes)
    }

    /// The image host of `layer`.
    pub fn image_host(&self, layer: LayerId) -> Option<&ImageHost> {
        match self.slot(layer)?.host.as_ref()? {
            Host::Image(h) => Some(h),
            Host::Content(_) => None,
        }
    }

    /// The content host of `layer`.
    pub fn content_host(&self, layer: LayerId) -> Option<&ContentHost> {
        match self.slot(layer)?.host.as_ref()? {
            Host::Content(h) => Some(h),
            Host::Image(_) => None,
        }
    }

    /// Runs GPU deletions posted from other threads.
    pub fn run_pending_tasks(&self) -> usize {
        self.tasks.run_pending()
    }

    fn slot(&self, layer: LayerId) -> Option<&LayerSlot> {
        self.layers
            .get(layer.index() as usize)?
            .as_ref()
            .filter(|s| s.id == layer)
    }

    fn slot_mut(&mut self, layer: LayerId) -> Option<&mut LayerSlot> {
        self.layers
            .get_mut(layer.index() as usize)?
            .as_mut()
            .filter(|s| s.id == layer)
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Applies every edit in order and returns the replies for the client.
    pub fn apply(&mut self, tx: Transaction) -> Vec<EditReply> {
        self.sequence += 1;
        let sequence = self.sequence;
        let mut sink = self.sink.take();
        let mut tracer = Tracer::from_option(sink.as_deref_mut().map(|s| s as &mut dyn TraceSink));

        let edits = u32::try_from(tx.edits.len()).unwrap_or(u32::MAX);
        let mut replies = Vec::new();
        let mut dropped = 0_u32;
        for edit in tx.edits {
            let layer = edit.layer();
            let name = edit.name();
            match self.apply_edit(edit, sequence, &mut tracer) {
                Ok(reply) => {
                    self.stats.edits_applied += 1;
                    replies.extend(reply);
                }
                Err((reason, reply)) => {
                    log::debug!("{layer:?}: {name} dropped ({reason:?})");
                    dropped += 1;
                    self.stats.edits_dropped += 1;
                    tracer.edit_dropped(&EditDroppedEvent {
                        sequence,
                        layer,
                        reason,
                    });
                    replies.extend(reply);
                }
            }
        }
        self.stats.transactions += 1;
        tracer.transaction(&TransactionEvent {
            sequence,
            edits,
            replies: u32::try_from(replies.len()).unwrap_or(u32::MAX),
            dropped,
        });
        drop(tracer);
        self.sink = sink;
        replies
    }

    fn apply_edit(
        &mut self,
        edit: Edit,
        sequence: u64,
        tracer: &mut Tracer<'_>,
    ) -> Result<Option<EditReply>, (DropReason, Option<EditReply>)> {
        match edit {
            Edit::CreateLayer { layer } => self.create_layer(layer).map(|()| None),
            Edit::Attach { layer, kind } => self.attach(layer, kind).map(|()| None),
            Edit::SetAttributes { layer, attributes } => {
                let slot = self
                    .slot_mut(layer)
                    .ok_or((DropReason::StaleLayer, None))?;
                slot.attributes = attributes;
                Ok(None)
            }
            Edit::PaintThebes {
                layer,
                identifier,
                buffer,
                updated_region,
                valid_region,
            } => self
                .paint_thebes(
                    layer,
                    identifier,
                    buffer,
                    &updated_region,
                    &valid_region,
                    sequence,
                    tracer,
                )
                .map(|swap| Some(EditReply::SwapThebes(swap))),
            Edit::UpdateImage {
                layer,
                identifier,
                image,
            } => self.update_image(layer, identifier, image, sequence, tracer),
            Edit::UpdatePictureRect { layer, rect } => self.update_picture_rect(layer, rect),
            Edit::DestroyLayer { layer } => self.destroy_layer(layer).map(|()| None),
        }
    }

    fn create_layer(&mut self, layer: LayerId) -> Result<(), (DropReason, Option<EditReply>)> {
        let idx = layer.index() as usize;
        if self.layers.len() <= idx {
            self.layers.resize_with(idx + 1, || None);
        }
        if let Some(old) = &self.layers[idx] {
            if old.id == layer {
                log::warn!("{layer:?} created twice");
                return Err((DropReason::Incompatible, None));
            }
            if old.id.generation() > layer.generation() {
                return Err((DropReason::StaleLayer, None));
            }
            log::warn!("{:?} replaced by {layer:?} without a destroy", old.id);
            let old = old.id;
            self.teardown_layer(old);
        }
        self.layers[idx] = Some(LayerSlot {
            id: layer,
            attributes: LayerAttributes::default(),
            host: None,
        });
        self.order.push(layer);
        log::debug!("{layer:?} created");
        Ok(())
    }

    fn attach(
        &mut self,
        layer: LayerId,
        kind: CompositableKind,
    ) -> Result<(), (DropReason, Option<EditReply>)> {
        if self.slot(layer).is_none() {
            return Err((DropReason::StaleLayer, None));
        }
        let host = if kind.is_content() {
            ContentHost::new(kind, &self.context, &self.pool).map(Host::Content)
        } else {
            ImageHost::new(kind, &self.context, &self.pool, self.recycle_bin.as_ref())
                .map(Host::Image)
        };
        let Some(host) = host else {
            return Err((DropReason::Incompatible, None));
        };
        let old = self
            .slot_mut(layer)
            .and_then(|s| s.host.replace(host));
        if let Some(mut old) = old {
            log::debug!("{layer:?}: compositable replaced by {kind:?}");
            self.teardown_host(&mut old);
        }
        Ok(())
    }

    fn paint_thebes(
        &mut self,
        layer: LayerId,
        identifier: TextureIdentifier,
        buffer: ThebesBuffer,
        updated_region: &IntRegion,
        valid_region: &IntRegion,
        sequence: u64,
        tracer: &mut Tracer<'_>,
    ) -> Result<ThebesSwap, (DropReason, Option<EditReply>)> {
        let handed_back = |reason: DropReason| {
            let swap = ThebesSwap {
                layer,
                identifier,
                new_back: Some(buffer),
                new_back_valid_region: IntRegion::new(),
                read_only_front: None,
                front_updated_region: IntRegion::new(),
            };
            (reason, Some(EditReply::SwapThebes(swap)))
        };
        let Some(slot) = self.slot_mut(layer) else {
            self.destroy_payload(&buffer.descriptor);
            return Err((DropReason::StaleLayer, None));
        };
        let host = match &mut slot.host {
            Some(Host::Content(h)) => h,
            Some(Host::Image(_)) => return Err(handed_back(DropReason::Incompatible)),
            None => return Err(handed_back(DropReason::NoCompositable)),
        };
        let outcome = host.update_thebes(layer, identifier, buffer, updated_region, valid_region);
        let policy = host.policy();
        if let Some(reason) = outcome.dropped {
            return Err((reason, Some(EditReply::SwapThebes(outcome.swap))));
        }
        tracer.swap(&SwapEvent {
            sequence,
            layer,
            policy,
            updated_bounds: updated_region.bounds(),
            returned_back: outcome.swap.new_back.is_some(),
            reset: outcome.reset,
        });
        #[cfg(feature = "trace-rich")]
        tracer.updated_region(sequence, layer, updated_region.rects());
        Ok(outcome.swap)
    }

    fn update_image(
        &mut self,
        layer: LayerId,
        identifier: TextureIdentifier,
        image: SharedImage,
        sequence: u64,
        tracer: &mut Tracer<'_>,
    ) -> Result<Option<EditReply>, (DropReason, Option<EditReply>)> {
        let returned = |image: SharedImage| {
            Some(EditReply::ReturnImage {
                layer,
                identifier,
                image,
            })
        };
        let Some(slot) = self.slot_mut(layer) else {
            self.destroy_image(&image);
            return Err((DropReason::StaleLayer, None));
        };
        let host = match &mut slot.host {
            Some(Host::Image(h)) => h,
            Some(Host::Content(_)) => return Err((DropReason::Incompatible, returned(image))),
            None => return Err((DropReason::NoCompositable, returned(image))),
        };
        let kind = host.kind();
        match host.update_image(identifier, image) {
            ImageUpdateOutcome::Accepted { previous } => {
                tracer.image_update(&ImageUpdateEvent {
                    sequence,
                    layer,
                    kind,
                    returned_previous: previous.is_some(),
                });
                Ok(previous.and_then(returned))
            }
            ImageUpdateOutcome::Rejected { image, reason } => Err((reason, returned(image))),
        }
    }

    fn update_picture_rect(
        &mut self,
        layer: LayerId,
        rect: IntRect,
    ) -> Result<Option<EditReply>, (DropReason, Option<EditReply>)> {
        let slot = self
            .slot_mut(layer)
            .ok_or((DropReason::StaleLayer, None))?;
        match &mut slot.host {
            Some(Host::Image(h)) => {
                if h.update_picture_rect(rect) {
                    Ok(None)
                } else {
                    Err((DropReason::Incompatible, None))
                }
            }
            Some(_) => Err((DropReason::Incompatible, None)),
            None => Err((DropReason::NoCompositable, None)),
        }
    }

    fn destroy_layer(&mut self, layer: LayerId) -> Result<(), (DropReason, Option<EditReply>)> {
        if self.slot(layer).is_none() {
            return Err((DropReason::StaleLayer, None));
        }
        self.teardown_layer(layer);
        log::debug!("{layer:?} destroyed");
        Ok(())
    }

    fn teardown_layer(&mut self, layer: LayerId) {
        let Some(slot) = self
            .layers
            .get_mut(layer.index() as usize)
            .and_then(Option::take)
        else {
            return;
        };
        self.order.retain(|&id| id != layer);
        if let Some(mut host) = slot.host {
            self.teardown_host(&mut host);
        }
    }

    fn teardown_host(&self, host: &mut Host) {
        match host {
            Host::Content(h) => {
                if let Some(front) = h.teardown() {
                    self.destroy_payload(&front.descriptor);
                }
            }
            Host::Image(h) => {
                for desc in h.teardown() {
                    self.destroy_payload(&desc);
                }
            }
        }
    }

    fn destroy_image(&self, image: &SharedImage) {
        match image {
            SharedImage::Surface(desc) => self.destroy_payload(desc),
            SharedImage::Yuv(yuv) => {
                for desc in yuv.planes() {
                    self.destroy_payload(&desc);
                }
            }
            SharedImage::External(_) => {}
        }
    }

    fn destroy_payload(&self, desc: &SurfaceDescriptor) {
        // Shared handles belong to their producer.
        if desc.as_shmem().is_none() {
            return;
        }
        if let Err(e) = self.pool.destroy_shared_surface(desc) {
            log::warn!("could not destroy orphaned {desc:?}: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Compositing
    // -----------------------------------------------------------------------

    /// Draws every visible layer in creation order into a fresh frame.
    pub fn composite(&mut self) -> FrameSummary {
        let ran = self.tasks.run_pending();
        if ran > 0 {
            log::trace!("ran {ran} deferred GPU tasks");
        }
        let frame_index = self.frame_index;
        self.frame_index += 1;
        let mut sink = self.sink.take();
        let mut tracer = Tracer::from_option(sink.as_deref_mut().map(|s| s as &mut dyn TraceSink));
        let mut summary = FrameSummaryBuilder::new(frame_index);

        self.compositor.begin_frame();
        for &layer in &self.order {
            let Some(slot) = self
                .layers
                .get(layer.index() as usize)
                .and_then(Option::as_ref)
            else {
                continue;
            };
            let result = if slot.attributes.hidden {
                Ok(0)
            } else {
                match &slot.host {
                    Some(Host::Content(h)) => h.composite(&mut self.compositor, &slot.attributes),
                    Some(Host::Image(h)) => h.composite(&mut self.compositor, &slot.attributes),
                    None => Err(DropReason::NoCompositable),
                }
            };
            let event = match result {
                Ok(quads) => CompositeEvent {
                    frame_index,
                    layer,
                    quads,
                    skipped: None,
                },
                Err(reason) => {
                    log::trace!("{layer:?} skipped: {reason:?}");
                    CompositeEvent {
                        frame_index,
                        layer,
                        quads: 0,
                        skipped: Some(reason),
                    }
                }
            };
            summary.record(&event);
            tracer.composite(&event);
        }

        let summary = summary.finish();
        self.stats.frames += 1;
        self.stats.quads += u64::from(summary.quads);
        self.stats.layers_skipped += u64::from(summary.layers_skipped);
        tracer.frame_summary(&summary);
        drop(tracer);
        self.sink = sink;
        summary
    }

    /// Applies every transaction waiting on `endpoint` and answers each.
    ///
    /// Returns the number of transactions applied.
    pub fn pump(&mut self, endpoint: &CompositorEndpoint) -> Result<usize, ChannelError> {
        let mut applied = 0;
        while let Some(tx) = endpoint.try_recv()? {
            let replies = self.apply(tx);
            endpoint.send_replies(&replies)?;
            applied += 1;
        }
        Ok(applied)
    }
}

impl<C: Compositor> Drop for CompositorSession<C> {
    fn drop(&mut self) {
        for layer in core::mem::take(&mut self.order) {
            self.teardown_layer(layer);
        }
        if let Some(bin) = &self.recycle_bin {
            bin.clear();
        }
        self.tasks.run_pending();
    }
}
