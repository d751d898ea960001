// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered painting for painted layers.
//!
//! A [`ContentClient`] owns the layer's back buffer. Each frame:
//!
//! 1. [`begin_paint`](ContentClient::begin_paint) reuses or reallocates the
//!    back buffer and computes the region that needs drawing.
//! 2. [`lock_paint_target`](ContentClient::lock_paint_target) maps it for
//!    drawing in layer coordinates.
//! 3. [`end_paint`](ContentClient::end_paint) sends the buffer to the
//!    compositor as an [`Edit::PaintThebes`].
//! 4. [`set_back_buffer_and_attrs`](ContentClient::set_back_buffer_and_attrs)
//!    takes the compositor's answer.
//!
//! ```text
//! Unallocated ─▶ Allocated ─▶ Painted ─▶ Submitted ─┬─▶ ReadOnlyFrontPending ─▶ Synced ─▶ Allocated
//!                                                   └─▶ Synced (texture policy) ───────────▶ Allocated
//! ```
//!
//! Under the direct policy the compositor hands back its *old* front, so the
//! pixels it just received must be copied back from the read-only front
//! before the client paints again. `begin_paint` does this automatically.

use std::sync::Arc;

use strata_core::descriptor::{BufferRect, CompositableKind, ContentType, TextureKind, ThebesBuffer};
use strata_core::geometry::{IntPoint, IntRect, IntSize};
use strata_core::layer::LayerId;
use strata_core::protocol::{Edit, ThebesSwap};
use strata_core::region::IntRegion;
use strata_surface::image::SurfaceRef;
use strata_surface::pool::OpenMode;
use strata_surface::rotated;

use crate::error::ClientError;
use crate::forwarder::LayerForwarder;
use crate::texture_client::{TextureClient, TextureClientLock};

/// How the compositor answers a painted buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentPolicy {
    /// Front and back swap; the client copies the new front back.
    Direct,
    /// The compositor uploads and returns the same buffer.
    Texture,
}

impl ContentPolicy {
    /// The compositable kind implementing this policy.
    #[must_use]
    pub const fn compositable(self) -> CompositableKind {
        match self {
            Self::Direct => CompositableKind::ContentDirect,
            Self::Texture => CompositableKind::ContentTexture,
        }
    }
}

/// Per-paint options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaintFlags {
    /// The painter cannot draw across wrap edges; unrotate the buffer first.
    pub no_rotation: bool,
}

/// Where a layer is in the paint protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentState {
    /// No back buffer yet.
    Unallocated,
    /// A back buffer is ready to paint.
    Allocated,
    /// The paint target has been locked at least once.
    Painted,
    /// The buffer was sent; waiting for the compositor's answer.
    Submitted,
    /// The compositor answered with a read-only front that must be copied
    /// back before painting.
    ReadOnlyFrontPending,
    /// Front and back agree.
    Synced,
}

/// Result of [`ContentClient::begin_paint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaintState {
    /// Layer-space region that must be drawn this frame.
    pub region_to_draw: IntRegion,
    /// Whether the buffer was unrotated in place.
    pub did_self_copy: bool,
    /// Geometry of the back buffer.
    pub geometry: BufferRect,
}

#[derive(Debug)]
enum Policy {
    Direct {
        read_only_front: Option<ThebesBuffer>,
        front_updated_region: IntRegion,
        front_and_back_differ: bool,
    },
    Texture,
}

/// Paint target and buffer bookkeeping for one painted layer.
#[derive(Debug)]
pub struct ContentClient {
    texture: TextureClient,
    policy: Policy,
    geometry: BufferRect,
    content_type: ContentType,
    valid_region: IntRegion,
    is_new_buffer: bool,
    state: ContentState,
}

impl ContentClient {
    /// Creates a client for `layer`, which must carry a compositable of
    /// `policy.compositable()`.
    #[must_use]
    pub fn new(forwarder: &LayerForwarder, layer: LayerId, policy: ContentPolicy) -> Self {
        let texture =
            forwarder.create_texture_client_for(TextureKind::Shmem, policy.compositable(), layer, 0);
        let policy = match policy {
            ContentPolicy::Direct => Policy::Direct {
                read_only_front: None,
                front_updated_region: IntRegion::new(),
                front_and_back_differ: false,
            },
            ContentPolicy::Texture => Policy::Texture,
        };
        Self {
            texture,
            policy,
            geometry: BufferRect::default(),
            content_type: ContentType::default(),
            valid_region: IntRegion::new(),
            is_new_buffer: false,
            state: ContentState::Unallocated,
        }
    }

    /// The layer.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.texture.layer()
    }

    /// The swap policy.
    #[must_use]
    pub fn policy(&self) -> ContentPolicy {
        match self.policy {
            Policy::Direct { .. } => ContentPolicy::Direct,
            Policy::Texture => ContentPolicy::Texture,
        }
    }

    /// Protocol state.
    #[must_use]
    pub fn state(&self) -> ContentState {
        self.state
    }

    /// Back buffer geometry.
    #[must_use]
    pub fn geometry(&self) -> BufferRect {
        self.geometry
    }

    /// Layer-space region holding valid content.
    #[must_use]
    pub fn valid_region(&self) -> &IntRegion {
        &self.valid_region
    }

    /// The back buffer's texture client.
    #[must_use]
    pub fn texture_client(&self) -> &TextureClient {
        &self.texture
    }

    /// The compositor's current front, readable until the next swap.
    #[must_use]
    pub fn read_only_front(&self) -> Option<&ThebesBuffer> {
        match &self.policy {
            Policy::Direct {
                read_only_front, ..
            } => read_only_front.as_ref(),
            Policy::Texture => None,
        }
    }

    /// Marks `region` as needing a repaint.
    pub fn invalidate(&mut self, region: &IntRegion) {
        self.valid_region.subtract_region(region);
    }

    /// Replaces the buffer rect and rotation together, returning the
    /// previous pair.
    pub fn set_buffer_geometry(&mut self, geometry: BufferRect) -> BufferRect {
        core::mem::replace(&mut self.geometry, geometry)
    }

    /// Prepares the back buffer to cover `visible` and computes what to draw.
    ///
    /// Reuses the buffer when size and content type match, absorbing a moved
    /// rect into the rotation (or unrotating in place under
    /// [`PaintFlags::no_rotation`]). Otherwise allocates a new buffer and
    /// invalidates everything. Fails with [`ClientError::SwapPending`] while
    /// the previous paint is unanswered.
    pub fn begin_paint(
        &mut self,
        visible: &IntRegion,
        content_type: ContentType,
        flags: PaintFlags,
    ) -> Result<PaintState, ClientError> {
        match self.state {
            ContentState::Submitted => return Err(ClientError::SwapPending),
            ContentState::ReadOnlyFrontPending => self.sync_front_buffer_to_back_buffer()?,
            _ => {}
        }
        let new_rect = visible.bounds();
        if new_rect.is_empty() {
            return Ok(PaintState {
                region_to_draw: IntRegion::new(),
                did_self_copy: false,
                geometry: self.geometry,
            });
        }

        let mut did_self_copy = false;
        let reusable = self
            .texture
            .descriptor()
            .is_some_and(|d| d.size() == new_rect.size() && d.content_type() == content_type);
        if reusable {
            if new_rect != self.geometry.rect {
                self.geometry = rotated::rotate_geometry(&self.geometry, new_rect);
                self.valid_region.intersect_rect(new_rect);
            }
            if flags.no_rotation && self.geometry.rotation != IntPoint::ZERO {
                let lock = self.texture.lock()?;
                let mut pixels = lock.pixels()?;
                self.geometry = rotated::unrotate(&mut pixels.surface_mut(), &self.geometry);
                did_self_copy = true;
            }
        } else {
            if self.texture.descriptor().is_some() {
                log::debug!(
                    "{:?}: back buffer {:?}/{:?} replaced by {:?}/{content_type:?}",
                    self.layer(),
                    self.texture.size(),
                    self.content_type,
                    new_rect.size()
                );
            }
            self.valid_region.clear();
            if let Err(e) = self.texture.ensure_allocated(new_rect.size(), content_type) {
                log::warn!("{:?}: paint aborted: {e}", self.layer());
                self.state = ContentState::Unallocated;
                return Err(e);
            }
            self.geometry = BufferRect::unrotated(new_rect);
            self.content_type = content_type;
            self.is_new_buffer = true;
            if let Policy::Direct {
                read_only_front,
                front_updated_region,
                front_and_back_differ,
            } = &mut self.policy
            {
                *read_only_front = None;
                front_updated_region.clear();
                *front_and_back_differ = false;
            }
        }

        self.state = ContentState::Allocated;
        Ok(PaintState {
            region_to_draw: visible.subtracted(&self.valid_region),
            did_self_copy,
            geometry: self.geometry,
        })
    }

    /// Maps the back buffer for drawing in layer coordinates.
    pub fn lock_paint_target(&mut self) -> Result<PaintTarget<'_>, ClientError> {
        if !matches!(self.state, ContentState::Allocated | ContentState::Painted) {
            return Err(ClientError::NoBuffer);
        }
        self.state = ContentState::Painted;
        let geometry = self.geometry;
        let lock = self.texture.lock()?;
        Ok(PaintTarget { lock, geometry })
    }

    /// Sends the back buffer. Ownership passes to the compositor until it
    /// answers.
    pub fn end_paint(&mut self, paint: &PaintState, visible: &IntRegion) -> Result<Edit, ClientError> {
        if self.state == ContentState::Submitted {
            return Err(ClientError::SwapPending);
        }
        let descriptor = self.texture.take_descriptor().ok_or(ClientError::NoBuffer)?;
        let updated_region =
            self.get_updated_region(&paint.region_to_draw, visible, paint.did_self_copy);
        self.valid_region.union_region(&paint.region_to_draw);
        self.valid_region.intersect_rect(self.geometry.rect);
        self.state = ContentState::Submitted;
        log::trace!(
            "{:?}: submitting {descriptor:?} updated {:?}",
            self.layer(),
            updated_region.bounds()
        );
        Ok(Edit::PaintThebes {
            layer: self.layer(),
            identifier: self.texture.identifier(),
            buffer: ThebesBuffer {
                descriptor,
                geometry: self.geometry,
            },
            updated_region,
            valid_region: self.valid_region.clone(),
        })
    }

    /// The region the compositor must treat as changed.
    ///
    /// A fresh buffer or an in-place unrotation leaves pixels outside the
    /// drawn region undefined on the other side, so the whole visible region
    /// is reported. Consumes the fresh-buffer flag.
    pub fn get_updated_region(
        &mut self,
        region_to_draw: &IntRegion,
        visible: &IntRegion,
        did_self_copy: bool,
    ) -> IntRegion {
        if self.is_new_buffer || did_self_copy {
            self.is_new_buffer = false;
            return visible.clone();
        }
        region_to_draw.clone()
    }

    /// Takes the compositor's answer to the last paint.
    pub fn set_back_buffer_and_attrs(&mut self, swap: &ThebesSwap) {
        if self.state != ContentState::Submitted {
            log::warn!(
                "{:?}: swap reply while {:?}",
                self.layer(),
                self.state
            );
        }
        self.texture
            .set_descriptor(swap.new_back.map(|b| b.descriptor));
        if let Some(back) = swap.new_back {
            self.geometry = back.geometry;
        }
        match &mut self.policy {
            Policy::Direct {
                read_only_front,
                front_updated_region,
                front_and_back_differ,
            } => {
                if swap.read_only_front.is_none() {
                    // Rejected: the host never saw this buffer's pixels.
                    log::debug!("{:?}: buffer handed back unread", self.texture.layer());
                    self.valid_region.clear();
                }
                *read_only_front = swap.read_only_front;
                *front_updated_region = swap.front_updated_region.clone();
                *front_and_back_differ = read_only_front.is_some();
                self.state = if *front_and_back_differ {
                    ContentState::ReadOnlyFrontPending
                } else {
                    ContentState::Synced
                };
            }
            Policy::Texture => {
                debug_assert!(
                    swap.read_only_front.is_none(),
                    "texture host answered with a read-only front"
                );
                self.is_new_buffer = false;
                self.valid_region = swap.new_back_valid_region.clone();
                self.state = ContentState::Synced;
            }
        }
    }

    /// Brings the back buffer up to date with the compositor's front.
    ///
    /// Direct policy: copies the front's updated region out of the read-only
    /// front, allocating a back buffer like the front if the compositor had
    /// none to return. Texture policy: nothing to copy.
    pub fn sync_front_buffer_to_back_buffer(&mut self) -> Result<(), ClientError> {
        let Policy::Direct {
            read_only_front,
            front_updated_region,
            front_and_back_differ,
        } = &mut self.policy
        else {
            if self.state == ContentState::Synced {
                debug_assert!(
                    self.texture.descriptor().is_some(),
                    "texture host returns the buffer it was sent"
                );
                debug_assert!(!self.is_new_buffer, "returned buffer is not new");
            }
            return Ok(());
        };
        if !*front_and_back_differ {
            return Ok(());
        }
        let Some(front) = *read_only_front else {
            *front_and_back_differ = false;
            self.state = ContentState::Synced;
            return Ok(());
        };

        let allocated = self
            .texture
            .ensure_allocated(front.descriptor.size(), front.descriptor.content_type())?;
        let copy = if allocated || self.geometry != front.geometry {
            IntRegion::from_rect(front.geometry.rect)
        } else {
            front_updated_region.clone()
        };
        log::trace!(
            "{:?}: reading back {:?} from {:?}",
            self.texture.layer(),
            copy.bounds(),
            front.descriptor
        );

        let pool = Arc::clone(self.texture.pool());
        match pool.open(OpenMode::ReadOnly, &front.descriptor) {
            Ok(src) => {
                let lock = self.texture.lock()?;
                let src_pixels = src.pixels();
                let mut dst_pixels = lock.pixels()?;
                rotated::copy_region(
                    &src_pixels.surface(),
                    &front.geometry,
                    &mut dst_pixels.surface_mut(),
                    &front.geometry,
                    &copy,
                );
            }
            Err(e) => {
                log::warn!(
                    "{:?}: read-only front unavailable ({e}); repainting everything",
                    self.texture.layer()
                );
                self.valid_region.clear();
            }
        }

        self.geometry = front.geometry;
        self.content_type = front.descriptor.content_type();
        self.is_new_buffer = false;
        *front_and_back_differ = false;
        self.state = ContentState::Synced;
        Ok(())
    }
}

/// A locked back buffer addressed in layer coordinates.
#[derive(Debug)]
pub struct PaintTarget<'a> {
    lock: TextureClientLock<'a>,
    geometry: BufferRect,
}

impl PaintTarget<'_> {
    /// Geometry of the locked buffer.
    #[must_use]
    pub fn geometry(&self) -> BufferRect {
        self.geometry
    }

    /// Fills a layer-space rect with a BGRA value.
    pub fn fill_rect(&mut self, rect: IntRect, px: [u8; 4]) -> Result<(), ClientError> {
        let mut pixels = self.lock.pixels()?;
        let mut surface = pixels.surface_mut();
        for (_, buffer) in rotated::map_rect(&self.geometry, rect) {
            surface.fill_rect(buffer, px);
        }
        Ok(())
    }

    /// Fills every rect of a layer-space region.
    pub fn fill_region(&mut self, region: &IntRegion, px: [u8; 4]) -> Result<(), ClientError> {
        for rect in region.rects() {
            self.fill_rect(*rect, px)?;
        }
        Ok(())
    }

    /// Copies `src` so its top-left lands on the layer-space `origin`.
    pub fn draw_surface(&mut self, src: &SurfaceRef<'_>, origin: IntPoint) -> Result<(), ClientError> {
        let mut pixels = self.lock.pixels()?;
        let mut surface = pixels.surface_mut();
        let area = IntRect::from_origin_size(origin, src.size());
        for (logical, buffer) in rotated::map_rect(&self.geometry, area) {
            surface.copy_from(src, logical.translate(-origin), buffer.origin());
        }
        Ok(())
    }

    /// Reads the pixel at a layer-space position.
    pub fn pixel(&self, p: IntPoint) -> Result<[u8; 4], ClientError> {
        let pixels = self.lock.pixels()?;
        Ok(rotated::map_rect(&self.geometry, IntRect::from_origin_size(p, IntSize::new(1, 1)))
            .first()
            .map_or([0; 4], |(_, b)| pixels.surface().pixel(b.x, b.y)))
    }

    /// Releases the lock.
    pub fn unlock(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use strata_core::descriptor::SurfaceDescriptor;
    use strata_surface::pool::SurfacePool;

    use super::*;

    const RED: [u8; 4] = [0, 0, 255, 255];
    const BLUE: [u8; 4] = [255, 0, 0, 255];

    fn setup(policy: ContentPolicy) -> (LayerForwarder, ContentClient) {
        let mut forwarder = LayerForwarder::new(Arc::new(SurfacePool::default()));
        let layer = forwarder.create_layer(policy.compositable());
        let client = ContentClient::new(&forwarder, layer, policy);
        (forwarder, client)
    }

    fn visible(w: i32, h: i32) -> IntRegion {
        IntRegion::from_rect(IntRect::new(0, 0, w, h))
    }

    fn paint_thebes(edit: Edit) -> (ThebesBuffer, IntRegion, IntRegion) {
        let Edit::PaintThebes {
            buffer,
            updated_region,
            valid_region,
            ..
        } = edit
        else {
            panic!("expected a PaintThebes edit");
        };
        (buffer, updated_region, valid_region)
    }

    /// Answers a paint the way a texture host does: same buffer back.
    fn texture_reply(client: &ContentClient, buffer: ThebesBuffer, valid: IntRegion) -> ThebesSwap {
        ThebesSwap {
            layer: client.layer(),
            identifier: client.texture_client().identifier(),
            new_back: Some(buffer),
            new_back_valid_region: valid,
            read_only_front: None,
            front_updated_region: IntRegion::new(),
        }
    }

    #[test]
    fn new_buffer_escalates_to_visible() {
        let (_f, mut c) = setup(ContentPolicy::Texture);
        let vis = visible(100, 100);
        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        assert_eq!(paint.region_to_draw, vis, "nothing valid yet");
        let partial = IntRegion::from_rect(IntRect::new(0, 0, 50, 50));
        assert_eq!(
            c.get_updated_region(&partial, &vis, false),
            vis,
            "fresh buffer reports the whole visible region"
        );
        let small = IntRegion::from_rect(IntRect::new(10, 10, 20, 20));
        assert_eq!(
            c.get_updated_region(&small, &vis, false),
            small,
            "second paint reports exactly what was drawn"
        );
        assert_eq!(
            c.get_updated_region(&small, &vis, true),
            vis,
            "self-copy escalates again"
        );
    }

    #[test]
    fn texture_policy_round_trip() {
        let (_f, mut c) = setup(ContentPolicy::Texture);
        let vis = visible(100, 100);
        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        c.lock_paint_target()
            .unwrap()
            .fill_region(&paint.region_to_draw, RED)
            .unwrap();
        let (buffer, updated, valid) = paint_thebes(c.end_paint(&paint, &vis).unwrap());
        assert_eq!(updated, vis, "first paint updates everything");
        assert_eq!(c.state(), ContentState::Submitted, "waiting for reply");
        assert!(
            c.texture_client().descriptor().is_none(),
            "buffer left with the edit"
        );

        c.set_back_buffer_and_attrs(&texture_reply(&c, buffer, valid));
        assert_eq!(c.state(), ContentState::Synced, "texture reply syncs");

        let dirty = IntRegion::from_rect(IntRect::new(10, 10, 20, 20));
        c.invalidate(&dirty);
        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        assert_eq!(paint.region_to_draw, dirty, "only the invalid part");
        let (_, updated, _) = paint_thebes(c.end_paint(&paint, &vis).unwrap());
        assert_eq!(updated, dirty, "reused buffer reports the literal region");
    }

    #[test]
    fn paint_while_submitted_is_refused() {
        let (_f, mut c) = setup(ContentPolicy::Texture);
        let vis = visible(8, 8);
        let paint = c
            .begin_paint(&vis, ContentType::Color, PaintFlags::default())
            .unwrap();
        let _edit = c.end_paint(&paint, &vis).unwrap();
        assert_eq!(
            c.begin_paint(&vis, ContentType::Color, PaintFlags::default()),
            Err(ClientError::SwapPending),
            "no painting into a buffer the compositor owns"
        );
    }

    #[test]
    fn geometry_swap_round_trips() {
        let (_f, mut c) = setup(ContentPolicy::Direct);
        let original = c.geometry();
        let moved = BufferRect {
            rect: IntRect::new(5, 5, 20, 20),
            rotation: IntPoint::new(3, 7),
        };
        let prev = c.set_buffer_geometry(moved);
        assert_eq!(prev, original, "previous pair returned");
        let back = c.set_buffer_geometry(prev);
        assert_eq!(back, moved, "swapped-in pair returned");
        assert_eq!(c.geometry(), original, "state restored");
    }

    #[test]
    fn content_type_change_invalidates() {
        let (_f, mut c) = setup(ContentPolicy::Texture);
        let vis = visible(8, 8);
        let paint = c
            .begin_paint(&vis, ContentType::Color, PaintFlags::default())
            .unwrap();
        let (buffer, _, valid) = paint_thebes(c.end_paint(&paint, &vis).unwrap());
        c.set_back_buffer_and_attrs(&texture_reply(&c, buffer, valid));
        assert!(!c.valid_region().is_empty(), "painted");
        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        assert_eq!(paint.region_to_draw, vis, "new content type repaints all");
        assert_ne!(
            c.texture_client().descriptor().map(SurfaceDescriptor::content_type),
            Some(ContentType::Color),
            "buffer reallocated"
        );
    }

    #[test]
    fn scroll_rotates_then_unrotates_on_request() {
        let (_f, mut c) = setup(ContentPolicy::Texture);
        let vis = visible(10, 10);
        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        {
            let mut t = c.lock_paint_target().unwrap();
            t.fill_rect(IntRect::new(0, 0, 10, 10), BLUE).unwrap();
            t.fill_rect(IntRect::new(4, 4, 1, 1), RED).unwrap();
        }
        let (buffer, _, valid) = paint_thebes(c.end_paint(&paint, &vis).unwrap());
        c.set_back_buffer_and_attrs(&texture_reply(&c, buffer, valid));

        let scrolled = IntRegion::from_rect(IntRect::new(2, 3, 10, 10));
        let paint = c
            .begin_paint(&scrolled, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        assert_eq!(
            paint.geometry.rotation,
            IntPoint::new(2, 3),
            "scroll absorbed by rotation"
        );
        assert!(!paint.did_self_copy, "no copy needed");
        assert_eq!(
            paint.region_to_draw.area(),
            100 - 8 * 7,
            "only the newly exposed strip"
        );
        assert_eq!(
            c.lock_paint_target()
                .unwrap()
                .pixel(IntPoint::new(4, 4))
                .unwrap(),
            RED,
            "content kept its layer position"
        );
        let (buffer, _, valid) = paint_thebes(c.end_paint(&paint, &scrolled).unwrap());
        c.set_back_buffer_and_attrs(&texture_reply(&c, buffer, valid));

        let paint = c
            .begin_paint(
                &scrolled,
                ContentType::ColorAlpha,
                PaintFlags { no_rotation: true },
            )
            .unwrap();
        assert!(paint.did_self_copy, "unrotated in place");
        assert_eq!(paint.geometry.rotation, IntPoint::ZERO, "no rotation left");
        assert_eq!(
            c.lock_paint_target()
                .unwrap()
                .pixel(IntPoint::new(4, 4))
                .unwrap(),
            RED,
            "unrotation preserves layer content"
        );
        let updated = c.get_updated_region(&paint.region_to_draw, &scrolled, paint.did_self_copy);
        assert_eq!(updated, scrolled, "self-copy reports everything");
    }

    #[test]
    fn direct_policy_reads_back_front() {
        let (f, mut c) = setup(ContentPolicy::Direct);
        let vis = visible(4, 4);
        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        c.lock_paint_target()
            .unwrap()
            .fill_rect(IntRect::new(0, 0, 4, 4), RED)
            .unwrap();
        let (buffer, updated, _) = paint_thebes(c.end_paint(&paint, &vis).unwrap());

        // First swap: the host had no front to return.
        c.set_back_buffer_and_attrs(&ThebesSwap {
            layer: c.layer(),
            identifier: c.texture_client().identifier(),
            new_back: None,
            new_back_valid_region: IntRegion::new(),
            read_only_front: Some(buffer),
            front_updated_region: updated,
        });
        assert_eq!(
            c.state(),
            ContentState::ReadOnlyFrontPending,
            "front must be copied back"
        );

        let paint = c
            .begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
            .unwrap();
        assert!(paint.region_to_draw.is_empty(), "everything still valid");
        let back = *c.texture_client().descriptor().unwrap();
        assert_ne!(back, buffer.descriptor, "a separate back buffer");
        assert_eq!(
            c.lock_paint_target()
                .unwrap()
                .pixel(IntPoint::new(3, 3))
                .unwrap(),
            RED,
            "front content copied into the back"
        );
        assert_eq!(f.pool().live_buffers(), 2, "front and back both live");
    }

    #[test_log::test]
    fn failed_allocation_aborts_paint() {
        let mut forwarder = LayerForwarder::new(Arc::new(SurfacePool::new(
            strata_surface::pool::PoolConfig { max_bytes: 16 },
        )));
        let layer = forwarder.create_layer(CompositableKind::ContentTexture);
        let mut c = ContentClient::new(&forwarder, layer, ContentPolicy::Texture);
        let vis = IntRegion::from_rect(IntRect::from_size(IntSize::new(64, 64)));
        assert!(
            c.begin_paint(&vis, ContentType::ColorAlpha, PaintFlags::default())
                .is_err(),
            "pool too small"
        );
        assert_eq!(c.state(), ContentState::Unallocated, "nothing half-built");
        assert!(c.lock_paint_target().is_err(), "no target to lock");
    }
}
