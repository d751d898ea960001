// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor-side hosts for painted content.
//!
//! The host keeps one texture laid out like the client's buffer (buffer
//! space, rotation included) and composites it one quadrant at a time.
//! Only the updated region is uploaded when the texture can be kept.
//!
//! Under [`SwapPolicy::Direct`] the host adopts each buffer it receives as
//! its front and hands the previous front back as the client's next back
//! buffer. If the size changed the previous front is destroyed instead. Under
//! [`SwapPolicy::Texture`] the host copies and hands the same buffer back.

use std::sync::Arc;

use kurbo::Vec2;
use strata_core::descriptor::{
    BufferRect, CompositableKind, TextureIdentifier, TextureKind, ThebesBuffer,
};
use strata_core::layer::LayerId;
use strata_core::protocol::{LayerAttributes, ThebesSwap};
use strata_core::region::IntRegion;
use strata_core::trace::{DropReason, SwapPolicy};
use strata_surface::pool::SurfacePool;
use strata_surface::rotated;

use crate::compositor::Compositor;
use crate::effect::EffectChain;
use crate::gpu::GpuContext;
use crate::texture_host::TextureHost;

/// Result of [`ContentHost::update_thebes`].
#[derive(Clone, Debug, PartialEq)]
pub struct SwapOutcome {
    /// Reply for the client.
    pub swap: ThebesSwap,
    /// The old front was destroyed because the buffer size changed.
    pub reset: bool,
    /// Set when the buffer was handed back unread.
    pub dropped: Option<DropReason>,
}

/// Draws one painted layer.
#[derive(Debug)]
pub struct ContentHost {
    policy: SwapPolicy,
    texture: TextureHost,
    pool: Arc<SurfacePool>,
    geometry: BufferRect,
    valid: IntRegion,
}

impl ContentHost {
    /// Creates the host for `kind`, or `None` for image kinds.
    #[must_use]
    pub fn new(
        kind: CompositableKind,
        context: &Arc<dyn GpuContext>,
        pool: &Arc<SurfacePool>,
    ) -> Option<Self> {
        let policy = match kind {
            CompositableKind::ContentDirect => SwapPolicy::Direct,
            CompositableKind::ContentTexture => SwapPolicy::Texture,
            _ => return None,
        };
        Some(Self {
            policy,
            texture: TextureHost::new(
                TextureIdentifier::new(kind, TextureKind::Shmem),
                Arc::clone(context),
                Arc::clone(pool),
            ),
            pool: Arc::clone(pool),
            geometry: BufferRect::default(),
            valid: IntRegion::new(),
        })
    }

    /// The swap policy.
    #[must_use]
    pub fn policy(&self) -> SwapPolicy {
        self.policy
    }

    /// Geometry of the composited buffer.
    #[must_use]
    pub fn geometry(&self) -> BufferRect {
        self.geometry
    }

    /// Layer-space region holding valid content.
    #[must_use]
    pub fn valid_region(&self) -> &IntRegion {
        &self.valid
    }

    /// The front buffer (direct policy only).
    #[must_use]
    pub fn front(&self) -> Option<ThebesBuffer> {
        self.texture.descriptor().map(|&descriptor| ThebesBuffer {
            descriptor,
            geometry: self.geometry,
        })
    }

    /// Takes a painted buffer and produces the reply.
    ///
    /// A buffer that cannot be read is handed back with an empty valid region
    /// so the client repaints it in full.
    pub fn update_thebes(
        &mut self,
        layer: LayerId,
        identifier: TextureIdentifier,
        buffer: ThebesBuffer,
        updated_region: &IntRegion,
        valid_region: &IntRegion,
    ) -> SwapOutcome {
        let old_geometry = self.geometry;
        let reset = self
            .texture
            .descriptor()
            .is_some_and(|front| front.size() != buffer.descriptor.size());
        let upload = rotated::buffer_region(&buffer.geometry, updated_region);

        let previous = match self.texture.update_region(buffer.descriptor, &upload) {
            Ok(previous) => previous,
            Err(e) => {
                log::warn!("{layer:?}: painted buffer rejected: {e}");
                return SwapOutcome {
                    swap: ThebesSwap {
                        layer,
                        identifier,
                        new_back: Some(buffer),
                        new_back_valid_region: IntRegion::new(),
                        read_only_front: None,
                        front_updated_region: IntRegion::new(),
                    },
                    reset: false,
                    dropped: Some(DropReason::AllocationFailed),
                };
            }
        };
        self.geometry = buffer.geometry;
        let mut valid = valid_region.clone();
        valid.intersect_rect(buffer.geometry.rect);
        let old_valid = core::mem::replace(&mut self.valid, valid);

        let swap = match self.policy {
            SwapPolicy::Direct => {
                let new_back = match previous {
                    Some(front) if reset => {
                        log::debug!("{layer:?}: front resized; destroying {front:?}");
                        if let Err(e) = self.pool.destroy_shared_surface(&front) {
                            log::warn!("{layer:?}: could not destroy old front: {e}");
                        }
                        None
                    }
                    Some(front) => Some(ThebesBuffer {
                        descriptor: front,
                        geometry: old_geometry,
                    }),
                    None => None,
                };
                ThebesSwap {
                    layer,
                    identifier,
                    new_back,
                    new_back_valid_region: old_valid.subtracted(updated_region),
                    read_only_front: Some(buffer),
                    front_updated_region: updated_region.clone(),
                }
            }
            SwapPolicy::Texture => {
                self.texture.take_descriptor();
                debug_assert!(previous.is_none(), "texture host retained a buffer");
                ThebesSwap {
                    layer,
                    identifier,
                    new_back: Some(buffer),
                    new_back_valid_region: self.valid.clone(),
                    read_only_front: None,
                    front_updated_region: IntRegion::new(),
                }
            }
        };
        SwapOutcome {
            swap,
            reset,
            dropped: None,
        }
    }

    /// Draws the valid part of the buffer, one quad per quadrant.
    pub fn composite(
        &self,
        compositor: &mut dyn Compositor,
        attributes: &LayerAttributes,
    ) -> Result<u32, DropReason> {
        let visible = self.valid.bounds();
        if visible.is_empty() {
            return Ok(0);
        }
        let lock = self
            .texture
            .lock(attributes.filter)
            .ok_or(DropReason::LockFailed)?;
        let mut effects = EffectChain::new();
        effects.insert(lock.effect());
        let mut quads = 0;
        for q in rotated::quadrants(&self.geometry) {
            let piece = q.logical.intersect(&visible);
            if piece.is_empty() {
                continue;
            }
            compositor.draw_quad(
                piece.to_rect(),
                Some(q.to_buffer(piece).to_rect()),
                attributes.clip,
                &effects,
                attributes.opacity,
                attributes.transform,
                Vec2::ZERO,
            );
            quads += 1;
        }
        Ok(quads)
    }

    /// Releases the texture and returns the front buffer, if held.
    pub fn teardown(&mut self) -> Option<ThebesBuffer> {
        let front = self.front();
        self.texture.teardown();
        self.valid.clear();
        front
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Affine;
    use strata_core::descriptor::{ContentType, SurfaceDescriptor};
    use strata_core::geometry::{IntPoint, IntRect, IntSize};
    use strata_surface::handoff::TaskQueue;
    use strata_surface::pool::OpenMode;

    use super::*;
    use crate::software::{SoftwareCompositor, SoftwareContext};

    struct Fixture {
        _queue: TaskQueue,
        context: Arc<dyn GpuContext>,
        compositor: SoftwareCompositor,
        pool: Arc<SurfacePool>,
        layer: LayerId,
    }

    impl Fixture {
        fn new() -> Self {
            let queue = TaskQueue::for_current_thread();
            let soft = Arc::new(SoftwareContext::new(queue.handle()));
            Self {
                _queue: queue,
                context: Arc::clone(&soft) as Arc<dyn GpuContext>,
                compositor: SoftwareCompositor::new(soft, IntSize::new(16, 16)),
                pool: Arc::new(SurfacePool::default()),
                layer: LayerId::from_raw(0, 0),
            }
        }

        fn host(&self, kind: CompositableKind) -> ContentHost {
            ContentHost::new(kind, &self.context, &self.pool).unwrap()
        }

        fn buffer(&self, rect: IntRect, px: [u8; 4]) -> ThebesBuffer {
            let descriptor = self
                .pool
                .alloc_buffer(rect.size(), ContentType::ColorAlpha)
                .unwrap();
            self.fill(&descriptor, px);
            ThebesBuffer {
                descriptor,
                geometry: BufferRect::unrotated(rect),
            }
        }

        fn fill(&self, descriptor: &SurfaceDescriptor, px: [u8; 4]) {
            let open = self.pool.open(OpenMode::ReadWrite, descriptor).unwrap();
            let mut pixels = open.pixels_mut().unwrap();
            let mut s = pixels.surface_mut();
            s.fill_rect(s.bounds(), px);
        }

        fn send(
            &self,
            host: &mut ContentHost,
            buffer: ThebesBuffer,
            updated: IntRect,
        ) -> SwapOutcome {
            let region = IntRegion::from_rect(updated);
            host.update_thebes(
                self.layer,
                TextureIdentifier::new(
                    host.texture.identifier().compositable,
                    TextureKind::Shmem,
                ),
                buffer,
                &region,
                &IntRegion::from_rect(buffer.geometry.rect),
            )
        }
    }

    #[test]
    fn direct_returns_old_front_as_back() {
        let fx = Fixture::new();
        let mut host = fx.host(CompositableKind::ContentDirect);
        let rect = IntRect::new(0, 0, 8, 8);
        let a = fx.buffer(rect, [1; 4]);
        let first = fx.send(&mut host, a, rect);
        assert_eq!(first.swap.new_back, None, "no front to return yet");
        assert_eq!(first.swap.read_only_front, Some(a), "a becomes the front");

        let b = fx.buffer(rect, [2; 4]);
        let second = fx.send(&mut host, b, IntRect::new(0, 0, 2, 2));
        assert_eq!(second.swap.new_back, Some(a), "old front handed back");
        assert_eq!(
            second.swap.front_updated_region,
            IntRegion::from_rect(IntRect::new(0, 0, 2, 2)),
            "client copies back what changed"
        );
        assert!(!second.reset, "same size");
        assert_eq!(host.front(), Some(b), "b adopted");
    }

    #[test]
    fn direct_resize_destroys_old_front() {
        let fx = Fixture::new();
        let mut host = fx.host(CompositableKind::ContentDirect);
        let a = fx.buffer(IntRect::new(0, 0, 8, 8), [1; 4]);
        fx.send(&mut host, a, a.geometry.rect);
        let b = fx.buffer(IntRect::new(0, 0, 12, 12), [2; 4]);
        let outcome = fx.send(&mut host, b, b.geometry.rect);
        assert!(outcome.reset, "size changed");
        assert_eq!(outcome.swap.new_back, None, "nothing handed back");
        assert!(!fx.pool.contains(&a.descriptor), "old front destroyed");
    }

    #[test]
    fn texture_policy_hands_the_same_buffer_back() {
        let fx = Fixture::new();
        let mut host = fx.host(CompositableKind::ContentTexture);
        let rect = IntRect::new(0, 0, 4, 4);
        let a = fx.buffer(rect, [7; 4]);
        let outcome = fx.send(&mut host, a, rect);
        assert_eq!(outcome.swap.new_back, Some(a), "same buffer");
        assert_eq!(outcome.swap.read_only_front, None, "no swap");
        assert_eq!(
            outcome.swap.new_back_valid_region,
            IntRegion::from_rect(rect),
            "valid region echoed"
        );
        assert_eq!(host.front(), None, "host keeps only its texture");
    }

    #[test]
    fn rotated_buffer_composites_in_layer_order() {
        let mut fx = Fixture::new();
        let mut host = fx.host(CompositableKind::ContentTexture);
        let rect = IntRect::new(0, 0, 4, 1);
        let descriptor = fx.pool.alloc_buffer(rect.size(), ContentType::ColorAlpha).unwrap();
        {
            let open = fx.pool.open(OpenMode::ReadWrite, &descriptor).unwrap();
            let mut pixels = open.pixels_mut().unwrap();
            let mut s = pixels.surface_mut();
            // Layer x = 0 lives at buffer x = 3.
            s.set_pixel(3, 0, [0, 0, 255, 255]);
            s.fill_rect(IntRect::new(0, 0, 3, 1), [255, 0, 0, 255]);
        }
        let buffer = ThebesBuffer {
            descriptor,
            geometry: BufferRect {
                rect,
                rotation: IntPoint::new(3, 0),
            },
        };
        fx.send(&mut host, buffer, rect);
        let quads = host
            .composite(&mut fx.compositor, &LayerAttributes::default())
            .unwrap();
        assert_eq!(quads, 2, "two quadrants");
        let frame = fx.compositor.frame();
        assert_eq!(frame.pixel(0, 0), [0, 0, 255, 255], "wrapped column first");
        assert_eq!(frame.pixel(1, 0), [255, 0, 0, 255], "then the rest");
    }

    #[test]
    fn partial_update_keeps_unchanged_pixels() {
        let mut fx = Fixture::new();
        let mut host = fx.host(CompositableKind::ContentDirect);
        let rect = IntRect::new(0, 0, 4, 4);
        let a = fx.buffer(rect, [0, 0, 255, 255]);
        fx.send(&mut host, a, rect);
        let b = fx.buffer(rect, [0, 255, 0, 255]);
        fx.send(&mut host, b, IntRect::new(0, 0, 1, 1));
        let attrs = LayerAttributes {
            transform: Affine::translate((4.0, 4.0)),
            ..LayerAttributes::default()
        };
        host.composite(&mut fx.compositor, &attrs).unwrap();
        let frame = fx.compositor.frame();
        assert_eq!(frame.pixel(4, 4), [0, 255, 0, 255], "updated pixel");
        assert_eq!(frame.pixel(6, 6), [0, 0, 255, 255], "rest untouched");
    }

    #[test_log::test]
    fn unreadable_buffer_is_handed_back() {
        let fx = Fixture::new();
        let mut host = fx.host(CompositableKind::ContentDirect);
        let rect = IntRect::new(0, 0, 4, 4);
        let a = fx.buffer(rect, [1; 4]);
        let _held = fx.pool.open(OpenMode::ReadWrite, &a.descriptor).unwrap();
        let outcome = fx.send(&mut host, a, rect);
        assert_eq!(outcome.dropped, Some(DropReason::AllocationFailed), "rejected");
        assert_eq!(outcome.swap.new_back, Some(a), "buffer handed back");
        assert_eq!(outcome.swap.read_only_front, None, "no front to copy from");
        assert!(
            outcome.swap.new_back_valid_region.is_empty(),
            "client repaints everything"
        );
    }
}
