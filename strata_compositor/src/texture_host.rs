// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor-side binding of one descriptor to one GPU texture.

use std::sync::Arc;

use strata_core::descriptor::{
    ContentType, Filter, SharedHandle, SurfaceDescriptor, TextureIdentifier,
};
use strata_core::geometry::{IntPoint, IntRect, IntSize};
use strata_core::region::IntRegion;
use strata_surface::pool::{OpenMode, SurfacePool};

use crate::effect::Effect;
use crate::error::GpuError;
use crate::gpu::{GpuContext, GpuTexture, TextureFormat};
use crate::recycle_bin::{TexturePurpose, TextureRecycleBin};

/// Holds the descriptor a compositable last received and the texture its
/// pixels were uploaded to.
pub struct TextureHost {
    identifier: TextureIdentifier,
    context: Arc<dyn GpuContext>,
    pool: Arc<SurfacePool>,
    descriptor: Option<SurfaceDescriptor>,
    texture: Option<GpuTexture>,
    imported: Option<SharedHandle>,
    inverted: bool,
    recycle: Option<(Arc<TextureRecycleBin>, TexturePurpose)>,
}

impl core::fmt::Debug for TextureHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextureHost")
            .field("identifier", &self.identifier)
            .field("descriptor", &self.descriptor)
            .field("texture", &self.texture)
            .finish_non_exhaustive()
    }
}

impl TextureHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new(
        identifier: TextureIdentifier,
        context: Arc<dyn GpuContext>,
        pool: Arc<SurfacePool>,
    ) -> Self {
        Self {
            identifier,
            context,
            pool,
            descriptor: None,
            texture: None,
            imported: None,
            inverted: false,
            recycle: None,
        }
    }

    /// Draws textures from, and returns them to, `bin`.
    #[must_use]
    pub fn with_recycle_bin(mut self, bin: Arc<TextureRecycleBin>, purpose: TexturePurpose) -> Self {
        self.recycle = Some((bin, purpose));
        self
    }

    /// The identifier this host answers to.
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> TextureIdentifier {
        self.identifier
    }

    /// The bound descriptor.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> Option<&SurfaceDescriptor> {
        self.descriptor.as_ref()
    }

    /// The texture holding the last upload.
    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<&GpuTexture> {
        self.texture.as_ref()
    }

    /// Unbinds the descriptor without touching the texture.
    pub fn take_descriptor(&mut self) -> Option<SurfaceDescriptor> {
        self.descriptor.take()
    }

    /// Binds `descriptor` and uploads all of it, returning the descriptor it
    /// replaces.
    ///
    /// On failure nothing is rebound: the previous descriptor and texture
    /// stay in place.
    pub fn update(
        &mut self,
        descriptor: SurfaceDescriptor,
    ) -> Result<Option<SurfaceDescriptor>, GpuError> {
        let full = IntRegion::from_rect(IntRect::from_size(descriptor.size()));
        self.update_region(descriptor, &full)
    }

    /// Binds `descriptor`, uploading only `region` (buffer space) when the
    /// current texture can be kept.
    ///
    /// A texture that has to be (re)created is filled from the whole buffer.
    pub fn update_region(
        &mut self,
        descriptor: SurfaceDescriptor,
        region: &IntRegion,
    ) -> Result<Option<SurfaceDescriptor>, GpuError> {
        match descriptor {
            SurfaceDescriptor::Shmem(_) => self.upload_shmem(&descriptor, region)?,
            SurfaceDescriptor::SharedTexture(shared) => {
                if self.imported != Some(shared.handle) {
                    let texture = GpuTexture::import(&self.context, &shared)?;
                    self.replace_texture(Some(texture));
                    self.imported = Some(shared.handle);
                }
                self.inverted = shared.inverted;
            }
        }
        Ok(self.descriptor.replace(descriptor))
    }

    fn upload_shmem(
        &mut self,
        descriptor: &SurfaceDescriptor,
        region: &IntRegion,
    ) -> Result<(), GpuError> {
        let size = descriptor.size();
        let format = TextureFormat::for_content(descriptor.content_type());
        let open = self.pool.open(OpenMode::ReadOnly, descriptor)?;
        let pixels = open.pixels();
        let src = pixels.surface();
        let bounds = IntRect::from_size(size);

        let reusable = self
            .texture
            .as_ref()
            .is_some_and(|t| self.imported.is_none() && t.size() == size && t.format() == format);
        if reusable && let Some(texture) = &self.texture {
            for rect in region.rects() {
                let rect = rect.intersect(&bounds);
                if !rect.is_empty() {
                    texture.upload(rect.origin(), &src, rect)?;
                }
            }
            return Ok(());
        }

        let texture = match &self.recycle {
            Some((bin, purpose)) => bin.get_texture(*purpose, size, &self.context, format)?,
            None => GpuTexture::new(&self.context, size, format)?,
        };
        texture.upload(IntPoint::ZERO, &src, bounds)?;
        self.replace_texture(Some(texture));
        self.imported = None;
        self.inverted = false;
        Ok(())
    }

    fn replace_texture(&mut self, texture: Option<GpuTexture>) {
        let Some(old) = core::mem::replace(&mut self.texture, texture) else {
            return;
        };
        match &self.recycle {
            Some((bin, purpose)) if self.imported.is_none() => {
                let size = old.size();
                bin.recycle_texture(old, *purpose, size);
            }
            _ => drop(old),
        }
    }

    /// Makes the texture drawable until the returned lock is dropped.
    ///
    /// Returns `None` if nothing has been uploaded yet.
    #[must_use]
    pub fn lock(&self, filter: Filter) -> Option<TextureLock<'_>> {
        let texture = self.texture.as_ref()?;
        let content_type = self
            .descriptor
            .as_ref()
            .map_or(ContentType::ColorAlpha, SurfaceDescriptor::content_type);
        let effect = match content_type {
            ContentType::Color => Effect::Bgrx {
                texture: texture.id(),
                filter,
                flipped: self.inverted,
            },
            ContentType::ColorAlpha | ContentType::Alpha => Effect::Bgra {
                texture: texture.id(),
                filter,
                flipped: self.inverted,
            },
        };
        log::trace!("{:?}: locked {:?}", self.identifier, texture.id());
        Some(TextureLock {
            texture,
            effect,
        })
    }

    /// Size of the uploaded texture.
    #[must_use]
    pub fn size(&self) -> Option<IntSize> {
        self.texture.as_ref().map(GpuTexture::size)
    }

    /// Releases the texture (recycling it when possible) and returns the
    /// bound descriptor for the caller to destroy or return.
    pub fn teardown(&mut self) -> Option<SurfaceDescriptor> {
        self.replace_texture(None);
        self.imported = None;
        self.descriptor.take()
    }
}

/// A drawable view of a [`TextureHost`]'s texture.
///
/// The host cannot be updated while a lock borrows it.
pub struct TextureLock<'a> {
    texture: &'a GpuTexture,
    effect: Effect,
}

impl core::fmt::Debug for TextureLock<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextureLock")
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

impl TextureLock<'_> {
    /// The effect sampling the whole texture.
    #[inline]
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// The locked texture.
    #[inline]
    #[must_use]
    pub fn texture(&self) -> &GpuTexture {
        self.texture
    }
}

impl Drop for TextureLock<'_> {
    fn drop(&mut self) {
        log::trace!("unlocked {:?}", self.texture.id());
    }
}

#[cfg(test)]
mod tests {
    use strata_core::descriptor::{CompositableKind, ShareType, TextureKind};
    use strata_surface::handoff::TaskQueue;
    use strata_surface::shared_handle::SharedHandleTable;

    use super::*;
    use crate::software::SoftwareContext;

    struct Fixture {
        _queue: TaskQueue,
        soft: Arc<SoftwareContext>,
        pool: Arc<SurfacePool>,
        table: Arc<SharedHandleTable>,
    }

    impl Fixture {
        fn new() -> Self {
            let queue = TaskQueue::for_current_thread();
            let table = Arc::new(SharedHandleTable::new(queue.handle()));
            let soft = Arc::new(SoftwareContext::with_shared_handles(
                queue.handle(),
                Arc::clone(&table),
            ));
            Self {
                _queue: queue,
                soft,
                pool: Arc::new(SurfacePool::default()),
                table,
            }
        }

        fn host(&self) -> TextureHost {
            TextureHost::new(
                TextureIdentifier::new(CompositableKind::ImageTexture, TextureKind::Shmem),
                Arc::clone(&self.soft) as Arc<dyn GpuContext>,
                Arc::clone(&self.pool),
            )
        }

        fn buffer(&self, size: IntSize, ct: ContentType, px: [u8; 4]) -> SurfaceDescriptor {
            let desc = self.pool.alloc_buffer(size, ct).unwrap();
            let open = self.pool.open(OpenMode::ReadWrite, &desc).unwrap();
            let mut pixels = open.pixels_mut().unwrap();
            let mut surface = pixels.surface_mut();
            surface.fill_rect(surface.bounds(), px);
            desc
        }

        fn texel(&self, host: &TextureHost, x: i32, y: i32) -> [u8; 4] {
            let id = host.texture().unwrap().id();
            self.soft.texture(id).unwrap().read().pixel(x, y)
        }
    }

    #[test]
    fn update_returns_the_replaced_descriptor() {
        let fx = Fixture::new();
        let mut host = fx.host();
        let a = fx.buffer(IntSize::new(4, 4), ContentType::ColorAlpha, [1, 2, 3, 4]);
        let b = fx.buffer(IntSize::new(4, 4), ContentType::ColorAlpha, [5, 6, 7, 8]);
        assert_eq!(host.update(a).unwrap(), None, "nothing bound before");
        assert_eq!(fx.texel(&host, 0, 0), [1, 2, 3, 4], "a uploaded");
        let first_texture = host.texture().unwrap().id();
        assert_eq!(host.update(b).unwrap(), Some(a), "a handed back");
        assert_eq!(fx.texel(&host, 3, 3), [5, 6, 7, 8], "b uploaded");
        assert_eq!(
            host.texture().unwrap().id(),
            first_texture,
            "same size keeps the texture"
        );
    }

    #[test]
    fn partial_update_only_touches_region() {
        let fx = Fixture::new();
        let mut host = fx.host();
        let size = IntSize::new(8, 8);
        let a = fx.buffer(size, ContentType::ColorAlpha, [1, 1, 1, 255]);
        host.update(a).unwrap();
        let b = fx.buffer(size, ContentType::ColorAlpha, [2, 2, 2, 255]);
        host.update_region(b, &IntRegion::from_rect(IntRect::new(0, 0, 2, 2)))
            .unwrap();
        assert_eq!(fx.texel(&host, 1, 1), [2, 2, 2, 255], "inside region");
        assert_eq!(fx.texel(&host, 5, 5), [1, 1, 1, 255], "outside region kept");
    }

    #[test]
    fn lock_picks_effect_from_content_type() {
        let fx = Fixture::new();
        let mut host = fx.host();
        assert!(host.lock(Filter::Linear).is_none(), "nothing to lock yet");
        host.update(fx.buffer(IntSize::new(2, 2), ContentType::Color, [0; 4]))
            .unwrap();
        let lock = host.lock(Filter::Nearest).unwrap();
        assert!(
            matches!(lock.effect(), Effect::Bgrx { filter: Filter::Nearest, .. }),
            "opaque content samples as BGRX"
        );
    }

    #[test]
    fn shared_texture_is_imported_once() {
        let fx = Fixture::new();
        let mut host = fx.host();
        let shared = fx
            .table
            .create(IntSize::new(4, 4), ShareType::SameProcess, true)
            .unwrap();
        host.update(SurfaceDescriptor::SharedTexture(shared)).unwrap();
        let id = host.texture().unwrap().id();
        host.update(SurfaceDescriptor::SharedTexture(shared)).unwrap();
        assert_eq!(host.texture().unwrap().id(), id, "same handle, same texture");
        let lock = host.lock(Filter::Linear).unwrap();
        assert!(
            matches!(lock.effect(), Effect::Bgra { flipped: true, .. }),
            "inverted handle samples flipped"
        );
    }

    #[test_log::test]
    fn failed_open_keeps_previous_binding() {
        let fx = Fixture::new();
        let mut host = fx.host();
        let a = fx.buffer(IntSize::new(2, 2), ContentType::ColorAlpha, [3; 4]);
        host.update(a).unwrap();
        let b = fx.buffer(IntSize::new(2, 2), ContentType::ColorAlpha, [4; 4]);
        fx.pool.destroy_shared_surface(&b).unwrap();
        assert!(host.update(b).is_err(), "destroyed buffer cannot be opened");
        assert_eq!(host.descriptor(), Some(&a), "a still bound");
        assert_eq!(host.teardown(), Some(a), "teardown returns a");
        assert_eq!(fx.soft.live_textures(), 0, "texture deleted inline");
    }
}
