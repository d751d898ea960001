// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor-side hosts for still images.
//!
//! Each variant answers an [`Edit::UpdateImage`](strata_core::protocol::Edit)
//! differently:
//!
//! - **Texture**: uploads the buffer, keeps it bound, and hands the
//!   previously bound buffer back to the client.
//! - **Shared**: imports the GPU handle. The producer owns handles, so nothing
//!   is handed back.
//! - **YCbCr**: uploads the three planes and hands the same image straight
//!   back. The planes' textures come from the session's recycle bin.

use std::sync::Arc;

use kurbo::{Rect, Vec2};
use strata_core::descriptor::{
    CompositableKind, Plane, SharedImage, SurfaceDescriptor, TextureIdentifier, TextureKind,
};
use strata_core::geometry::{IntRect, IntSize};
use strata_core::protocol::LayerAttributes;
use strata_core::trace::DropReason;
use strata_surface::pool::SurfacePool;

use crate::compositor::Compositor;
use crate::effect::{Effect, EffectChain};
use crate::gpu::GpuContext;
use crate::recycle_bin::{TexturePurpose, TextureRecycleBin};
use crate::texture_host::TextureHost;

/// What an image host did with an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageUpdateOutcome {
    /// The image was taken. `previous` goes back to the client.
    Accepted {
        /// Image the client may reuse or destroy.
        previous: Option<SharedImage>,
    },
    /// The image was not taken and goes back to the client unchanged.
    Rejected {
        /// The image as received.
        image: SharedImage,
        /// Why.
        reason: DropReason,
    },
}

/// Draws one image layer.
#[derive(Debug)]
pub enum ImageHost {
    /// A shared-memory image.
    Texture(TextureHost),
    /// A GPU handle owned by the producer.
    Shared(TextureHost),
    /// Three planes and the visible window into the luma plane.
    Yuv {
        /// Hosts indexed by [`Plane::index`].
        planes: [TextureHost; 3],
        /// Luma-space crop.
        picture_rect: IntRect,
    },
}

impl ImageHost {
    /// Creates the host for `kind`, or `None` for painted content.
    ///
    /// With a `bin`, YCbCr planes allocate through it.
    #[must_use]
    pub fn new(
        kind: CompositableKind,
        context: &Arc<dyn GpuContext>,
        pool: &Arc<SurfacePool>,
        bin: Option<&Arc<TextureRecycleBin>>,
    ) -> Option<Self> {
        let host = |identifier| TextureHost::new(identifier, Arc::clone(context), Arc::clone(pool));
        Some(match kind {
            CompositableKind::ImageTexture => {
                Self::Texture(host(TextureIdentifier::new(kind, TextureKind::Shmem)))
            }
            CompositableKind::ImageShared => {
                Self::Shared(host(TextureIdentifier::new(kind, TextureKind::SharedTexture)))
            }
            CompositableKind::ImageYuv => Self::Yuv {
                planes: Plane::ALL.map(|p| {
                    let plane = host(TextureIdentifier::plane(p));
                    match bin {
                        Some(bin) => plane.with_recycle_bin(Arc::clone(bin), purpose(p)),
                        None => plane,
                    }
                }),
                picture_rect: IntRect::EMPTY,
            },
            CompositableKind::ContentDirect | CompositableKind::ContentTexture => return None,
        })
    }

    /// The compositable kind.
    #[must_use]
    pub fn kind(&self) -> CompositableKind {
        match self {
            Self::Texture(_) => CompositableKind::ImageTexture,
            Self::Shared(_) => CompositableKind::ImageShared,
            Self::Yuv { .. } => CompositableKind::ImageYuv,
        }
    }

    /// Takes a new image.
    pub fn update_image(
        &mut self,
        identifier: TextureIdentifier,
        image: SharedImage,
    ) -> ImageUpdateOutcome {
        let reject = |image, reason| ImageUpdateOutcome::Rejected { image, reason };
        match (self, image) {
            (Self::Texture(host), SharedImage::Surface(desc @ SurfaceDescriptor::Shmem(_))) => {
                match host.update(desc) {
                    Ok(previous) => ImageUpdateOutcome::Accepted {
                        previous: previous.map(SharedImage::Surface),
                    },
                    Err(e) => {
                        log::warn!("{identifier:?}: image upload failed: {e}");
                        reject(SharedImage::Surface(desc), DropReason::AllocationFailed)
                    }
                }
            }
            (
                Self::Shared(host),
                SharedImage::Surface(desc @ SurfaceDescriptor::SharedTexture(_)),
            ) => match host.update(desc) {
                Ok(_) => ImageUpdateOutcome::Accepted { previous: None },
                Err(e) => {
                    log::warn!("{identifier:?}: import failed: {e}");
                    reject(SharedImage::Surface(desc), DropReason::AllocationFailed)
                }
            },
            (
                Self::Yuv {
                    planes,
                    picture_rect,
                },
                SharedImage::Yuv(yuv),
            ) => {
                for plane in Plane::ALL {
                    let host = &mut planes[plane.index() as usize];
                    let result = host.update(*yuv.plane(plane));
                    // The client keeps the planes; only the textures stay here.
                    host.take_descriptor();
                    if let Err(e) = result {
                        log::warn!("{identifier:?}: {plane:?} plane upload failed: {e}");
                        // Planes from two frames must never be drawn together.
                        for host in planes.iter_mut() {
                            host.teardown();
                        }
                        *picture_rect = IntRect::EMPTY;
                        return reject(SharedImage::Yuv(yuv), DropReason::AllocationFailed);
                    }
                }
                *picture_rect = clamp_to_luma(yuv.picture_rect, yuv.y.size());
                ImageUpdateOutcome::Accepted {
                    previous: Some(SharedImage::Yuv(yuv)),
                }
            }
            (_, image) => {
                log::warn!(
                    "{identifier:?}: {} image does not fit this host",
                    image.variant_name()
                );
                reject(image, DropReason::Incompatible)
            }
        }
    }

    /// Installs `host` in the slot its identifier names, dropping the host
    /// it replaces.
    ///
    /// YCbCr planes bind by plane index whatever the call order. A host that
    /// fits no slot is dropped and `false` returned.
    pub fn add_texture_host(&mut self, host: TextureHost) -> bool {
        let id = host.identifier();
        let slot = match self {
            Self::Yuv { planes, .. } if id.compositable == CompositableKind::ImageYuv => {
                Plane::from_index(id.index).map(|p| &mut planes[p.index() as usize])
            }
            Self::Texture(slot) if id.texture == TextureKind::Shmem => Some(slot),
            Self::Shared(slot) if id.texture == TextureKind::SharedTexture => Some(slot),
            _ => None,
        };
        match slot {
            Some(slot) => {
                *slot = host;
                true
            }
            None => {
                log::warn!("{id:?} does not fit a {:?} host", self.kind());
                false
            }
        }
    }

    /// Moves the YCbCr crop window, clamped to the luma plane once one has
    /// been uploaded. Ignored by other hosts.
    pub fn update_picture_rect(&mut self, rect: IntRect) -> bool {
        match self {
            Self::Yuv {
                planes,
                picture_rect,
            } => {
                *picture_rect = match planes[Plane::Y.index() as usize].size() {
                    Some(luma) => clamp_to_luma(rect, luma),
                    None => rect,
                };
                true
            }
            Self::Texture(_) | Self::Shared(_) => false,
        }
    }

    /// The YCbCr crop window.
    #[must_use]
    pub fn picture_rect(&self) -> Option<IntRect> {
        match self {
            Self::Yuv { picture_rect, .. } => Some(*picture_rect),
            Self::Texture(_) | Self::Shared(_) => None,
        }
    }

    /// The host of one YCbCr plane.
    #[must_use]
    pub fn plane_host(&self, plane: Plane) -> Option<&TextureHost> {
        match self {
            Self::Yuv { planes, .. } => Some(&planes[plane.index() as usize]),
            Self::Texture(_) | Self::Shared(_) => None,
        }
    }

    /// Draws the image with `attributes`, returning the quad count.
    ///
    /// Every texture must lock; if one does not, nothing is drawn.
    pub fn composite(
        &self,
        compositor: &mut dyn Compositor,
        attributes: &LayerAttributes,
    ) -> Result<u32, DropReason> {
        let filter = attributes.filter;
        let mut effects = EffectChain::new();
        match self {
            Self::Texture(host) | Self::Shared(host) => {
                let lock = host.lock(filter).ok_or(DropReason::LockFailed)?;
                effects.insert(lock.effect());
                let rect = IntRect::from_size(lock.texture().size()).to_rect();
                draw(compositor, rect, None, &effects, attributes);
                Ok(1)
            }
            Self::Yuv {
                planes,
                picture_rect,
            } => {
                let [y, cb, cr] = planes;
                let (Some(y), Some(cb), Some(cr)) = (y.lock(filter), cb.lock(filter), cr.lock(filter))
                else {
                    log::warn!("YCbCr plane could not be locked; skipping frame");
                    return Err(DropReason::LockFailed);
                };
                if picture_rect.is_empty() {
                    return Ok(0);
                }
                effects.insert(Effect::YCbCr {
                    y: y.texture().id(),
                    cb: cb.texture().id(),
                    cr: cr.texture().id(),
                    filter,
                });
                let rect = Rect::new(
                    0.0,
                    0.0,
                    f64::from(picture_rect.width),
                    f64::from(picture_rect.height),
                );
                draw(compositor, rect, Some(picture_rect.to_rect()), &effects, attributes);
                Ok(1)
            }
        }
    }

    /// Releases textures and returns any descriptor still held.
    pub fn teardown(&mut self) -> Vec<SurfaceDescriptor> {
        match self {
            Self::Texture(host) | Self::Shared(host) => host.teardown().into_iter().collect(),
            Self::Yuv { planes, .. } => planes.iter_mut().filter_map(TextureHost::teardown).collect(),
        }
    }
}

fn clamp_to_luma(rect: IntRect, luma: IntSize) -> IntRect {
    let clamped = rect.intersect(&IntRect::from_size(luma));
    if clamped != rect {
        log::debug!("picture rect {rect:?} clamped to {clamped:?} by {luma:?} luma plane");
    }
    clamped
}

fn purpose(plane: Plane) -> TexturePurpose {
    match plane {
        Plane::Y => TexturePurpose::Y,
        Plane::Cb | Plane::Cr => TexturePurpose::C,
    }
}

fn draw(
    compositor: &mut dyn Compositor,
    rect: Rect,
    source: Option<Rect>,
    effects: &EffectChain,
    attributes: &LayerAttributes,
) {
    compositor.draw_quad(
        rect,
        source,
        attributes.clip,
        effects,
        attributes.opacity,
        attributes.transform,
        Vec2::ZERO,
    );
}

#[cfg(test)]
mod tests {
    use kurbo::Affine;
    use strata_core::descriptor::{ContentType, YuvImage};
    use strata_surface::handoff::TaskQueue;
    use strata_surface::pool::OpenMode;

    use super::*;
    use crate::software::{SoftwareCompositor, SoftwareContext};

    struct Fixture {
        queue: TaskQueue,
        context: Arc<dyn GpuContext>,
        compositor: SoftwareCompositor,
        pool: Arc<SurfacePool>,
    }

    impl Fixture {
        fn new() -> Self {
            let queue = TaskQueue::for_current_thread();
            let soft = Arc::new(SoftwareContext::new(queue.handle()));
            Self {
                context: Arc::clone(&soft) as Arc<dyn GpuContext>,
                compositor: SoftwareCompositor::new(soft, IntSize::new(16, 16)),
                pool: Arc::new(SurfacePool::default()),
                queue,
            }
        }

        fn plane(&self, size: IntSize, value: u8) -> SurfaceDescriptor {
            let desc = self.pool.alloc_buffer(size, ContentType::Alpha).unwrap();
            let open = self.pool.open(OpenMode::ReadWrite, &desc).unwrap();
            let mut pixels = open.pixels_mut().unwrap();
            let mut s = pixels.surface_mut();
            s.fill_rect(s.bounds(), [0, 0, 0, value]);
            desc
        }

        fn yuv(&self) -> YuvImage {
            YuvImage {
                y: self.plane(IntSize::new(8, 8), 235),
                u: self.plane(IntSize::new(4, 4), 128),
                v: self.plane(IntSize::new(4, 4), 128),
                picture_rect: IntRect::new(0, 0, 8, 8),
            }
        }
    }

    #[test]
    fn yuv_update_returns_the_same_image() {
        let fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageYuv, &fx.context, &fx.pool, None).unwrap();
        let yuv = fx.yuv();
        let outcome = host.update_image(TextureIdentifier::plane(Plane::Y), SharedImage::Yuv(yuv));
        assert_eq!(
            outcome,
            ImageUpdateOutcome::Accepted {
                previous: Some(SharedImage::Yuv(yuv))
            },
            "planes handed straight back"
        );
        for plane in Plane::ALL {
            let plane_host = host.plane_host(plane).unwrap();
            assert!(plane_host.descriptor().is_none(), "{plane:?} not retained");
            assert_eq!(
                plane_host.size(),
                Some(yuv.plane(plane).size()),
                "{plane:?} texture sized to its plane"
            );
        }
        assert_eq!(host.picture_rect(), Some(yuv.picture_rect), "crop recorded");
    }

    #[test]
    fn texture_host_returns_the_previous_image() {
        let fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageTexture, &fx.context, &fx.pool, None).unwrap();
        let id = TextureIdentifier::new(CompositableKind::ImageTexture, TextureKind::Shmem);
        let a = fx.pool.alloc_buffer(IntSize::new(2, 2), ContentType::ColorAlpha).unwrap();
        let b = fx.pool.alloc_buffer(IntSize::new(2, 2), ContentType::ColorAlpha).unwrap();
        assert_eq!(
            host.update_image(id, SharedImage::Surface(a)),
            ImageUpdateOutcome::Accepted { previous: None },
            "first image"
        );
        assert_eq!(
            host.update_image(id, SharedImage::Surface(b)),
            ImageUpdateOutcome::Accepted {
                previous: Some(SharedImage::Surface(a))
            },
            "a returned"
        );
        assert_eq!(host.teardown(), vec![b], "b still held");
    }

    #[test]
    fn mismatched_image_is_rejected() {
        let fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageTexture, &fx.context, &fx.pool, None).unwrap();
        let yuv = SharedImage::Yuv(fx.yuv());
        assert_eq!(
            host.update_image(TextureIdentifier::plane(Plane::Y), yuv),
            ImageUpdateOutcome::Rejected {
                image: yuv,
                reason: DropReason::Incompatible
            },
            "texture host does not take planes"
        );
        assert!(
            ImageHost::new(CompositableKind::ContentDirect, &fx.context, &fx.pool, None).is_none(),
            "painted content has no image host"
        );
    }

    #[test]
    fn planes_bind_by_index_in_any_order() {
        let fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageYuv, &fx.context, &fx.pool, None).unwrap();
        for plane in [Plane::Cr, Plane::Y, Plane::Cb] {
            assert!(
                host.add_texture_host(TextureHost::new(
                    TextureIdentifier::plane(plane),
                    Arc::clone(&fx.context),
                    Arc::clone(&fx.pool),
                )),
                "{plane:?} accepted"
            );
        }
        for plane in Plane::ALL {
            assert_eq!(
                host.plane_host(plane).unwrap().identifier(),
                TextureIdentifier::plane(plane),
                "{plane:?} in slot {}",
                plane.index()
            );
        }
        let stray = TextureHost::new(
            TextureIdentifier::new(CompositableKind::ImageShared, TextureKind::SharedTexture),
            Arc::clone(&fx.context),
            Arc::clone(&fx.pool),
        );
        assert!(!host.add_texture_host(stray), "non-plane host refused");
    }

    #[test_log::test]
    fn missing_plane_aborts_the_composite() {
        let mut fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageYuv, &fx.context, &fx.pool, None).unwrap();
        host.update_image(TextureIdentifier::plane(Plane::Y), SharedImage::Yuv(fx.yuv()));
        let attrs = LayerAttributes::default();
        assert_eq!(
            host.composite(&mut fx.compositor, &attrs),
            Ok(1),
            "all planes present"
        );
        fx.compositor.begin_frame();

        assert!(
            host.add_texture_host(TextureHost::new(
                TextureIdentifier::plane(Plane::Cr),
                Arc::clone(&fx.context),
                Arc::clone(&fx.pool),
            )),
            "fresh Cr host installed"
        );
        assert_eq!(
            host.composite(&mut fx.compositor, &attrs),
            Err(DropReason::LockFailed),
            "empty Cr plane aborts"
        );
        assert_eq!(fx.compositor.frame().pixel(4, 4), [0; 4], "nothing drawn");
        assert_eq!(fx.queue.pending(), 0, "deletion ran inline");
    }

    #[test_log::test]
    fn failed_plane_upload_unbinds_every_plane() {
        let mut fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageYuv, &fx.context, &fx.pool, None).unwrap();
        let id = TextureIdentifier::plane(Plane::Y);
        host.update_image(id, SharedImage::Yuv(fx.yuv()));
        let attrs = LayerAttributes::default();
        assert_eq!(host.composite(&mut fx.compositor, &attrs), Ok(1), "first frame drawn");
        fx.compositor.begin_frame();

        let next = fx.yuv();
        fx.pool.destroy_shared_surface(&next.v).unwrap();
        assert!(
            matches!(
                host.update_image(id, SharedImage::Yuv(next)),
                ImageUpdateOutcome::Rejected {
                    reason: DropReason::AllocationFailed,
                    ..
                }
            ),
            "Cr plane cannot be read"
        );
        for plane in Plane::ALL {
            assert_eq!(host.plane_host(plane).unwrap().size(), None, "{plane:?} unbound");
        }
        assert_eq!(
            host.composite(&mut fx.compositor, &attrs),
            Err(DropReason::LockFailed),
            "no mixed frame is drawn"
        );
    }

    #[test_log::test]
    fn picture_rect_is_clamped_to_luma() {
        let fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageYuv, &fx.context, &fx.pool, None).unwrap();
        let mut yuv = fx.yuv();
        yuv.picture_rect = IntRect::new(4, 4, 10, 10);
        host.update_image(TextureIdentifier::plane(Plane::Y), SharedImage::Yuv(yuv));
        assert_eq!(
            host.picture_rect(),
            Some(IntRect::new(4, 4, 4, 4)),
            "crop kept inside the 8x8 luma plane"
        );
        assert!(host.update_picture_rect(IntRect::new(-2, 0, 6, 20)), "yuv takes crops");
        assert_eq!(
            host.picture_rect(),
            Some(IntRect::new(0, 0, 4, 8)),
            "later crops are clamped too"
        );
    }

    #[test]
    fn yuv_draws_picture_rect_at_origin() {
        let mut fx = Fixture::new();
        let mut host =
            ImageHost::new(CompositableKind::ImageYuv, &fx.context, &fx.pool, None).unwrap();
        let mut yuv = fx.yuv();
        yuv.picture_rect = IntRect::new(2, 2, 4, 4);
        host.update_image(TextureIdentifier::plane(Plane::Y), SharedImage::Yuv(yuv));
        let attrs = LayerAttributes {
            transform: Affine::translate((1.0, 1.0)),
            ..LayerAttributes::default()
        };
        host.composite(&mut fx.compositor, &attrs).unwrap();
        let frame = fx.compositor.frame();
        assert_eq!(frame.pixel(1, 1)[3], 255, "picture starts at the layer origin");
        assert_eq!(frame.pixel(5, 5), [0; 4], "picture is 4x4");
        assert!(host.update_picture_rect(IntRect::new(0, 0, 8, 8)), "yuv takes crops");
    }
}
