// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! wgpu texture storage for the strata compositor.
//!
//! [`WgpuContext`] implements [`GpuContext`] on top of a caller-provided
//! [`wgpu::Device`] and [`wgpu::Queue`]. Uploads go through
//! [`wgpu::Queue::write_texture`], so they are staged by wgpu and land before
//! the next submitted command buffer. Drawing is left to the embedder, which
//! looks textures up with [`WgpuContext::texture`].
//!
//! Cross-process handle import needs platform interop this crate does not
//! provide; [`GpuContext::import_shared`] reports
//! [`GpuError::Unsupported`].

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::Mutex;
use strata_compositor::{GpuContext, GpuError, TextureFormat, TextureId};
use strata_core::descriptor::SharedTextureDescriptor;
use strata_core::geometry::{IntPoint, IntRect, IntSize, dim};
use strata_surface::handoff::OwnerHandle;
use strata_surface::image::SurfaceRef;

/// The wgpu format backing `format`.
///
/// `Bgrx8` shares `Bgra8Unorm`; samplers ignore its alpha.
#[must_use]
pub const fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Bgra8 | TextureFormat::Bgrx8 => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
    }
}

/// A [`GpuContext`] backed by a wgpu device.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    owner: OwnerHandle,
    textures: Mutex<HashMap<TextureId, wgpu::Texture>>,
    next: AtomicU64,
}

impl core::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("owner", &self.owner)
            .field("textures", &self.textures.lock().len())
            .finish_non_exhaustive()
    }
}

impl WgpuContext {
    /// Wraps `device` and `queue`. Deletions run on `owner`'s thread.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, owner: OwnerHandle) -> Self {
        Self {
            device,
            queue,
            owner,
            textures: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// The device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The queue uploads are written to.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The wgpu texture behind `id`.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<wgpu::Texture> {
        self.textures.lock().get(&id).cloned()
    }

    /// Number of live textures.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }
}

fn extent(size: IntSize, max: u32) -> Option<wgpu::Extent3d> {
    let width = u32::try_from(size.width).ok()?;
    let height = u32::try_from(size.height).ok()?;
    (width > 0 && height > 0 && width <= max && height <= max).then_some(wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    })
}

/// Packs `rect` of `src` into tightly strided rows.
fn pack_rows(src: &SurfaceRef<'_>, rect: IntRect) -> Vec<u8> {
    let bpp = src.format().bytes_per_pixel();
    let start = dim(rect.x) * bpp;
    let len = dim(rect.width) * bpp;
    let mut out = Vec::with_capacity(len * dim(rect.height));
    for y in rect.y..rect.bottom() {
        out.extend_from_slice(&src.row(y)[start..start + len]);
    }
    out
}

impl GpuContext for WgpuContext {
    fn owner(&self) -> &OwnerHandle {
        &self.owner
    }

    fn create_texture(&self, size: IntSize, format: TextureFormat) -> Result<TextureId, GpuError> {
        let max = self.device.limits().max_texture_dimension_2d;
        let Some(extent) = extent(size, max) else {
            return Err(GpuError::AllocationFailed {
                size,
                reason: "outside the device's texture size limits",
            });
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("strata texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let id = TextureId(self.next.fetch_add(1, Ordering::Relaxed));
        self.textures.lock().insert(id, texture);
        log::trace!("{id:?}: created {size:?} {format:?}");
        Ok(id)
    }

    fn upload(
        &self,
        texture: TextureId,
        dst: IntPoint,
        src: &SurfaceRef<'_>,
        src_rect: IntRect,
    ) -> Result<(), GpuError> {
        let rect = src_rect.intersect(&src.bounds());
        if rect.is_empty() {
            return Ok(());
        }
        let target = self
            .texture(texture)
            .ok_or(GpuError::UnknownTexture(texture))?;
        let target_size = IntSize::new(
            i32::try_from(target.width()).unwrap_or(i32::MAX),
            i32::try_from(target.height()).unwrap_or(i32::MAX),
        );
        let dst_rect = IntRect::from_origin_size(
            IntPoint::new(dst.x + rect.x - src_rect.x, dst.y + rect.y - src_rect.y),
            rect.size(),
        );
        let Some(copy) = extent(rect.size(), u32::MAX) else {
            return Ok(());
        };
        if !IntRect::from_size(target_size).contains(&dst_rect) {
            return Err(GpuError::AllocationFailed {
                size: rect.size(),
                reason: "upload extends past the texture",
            });
        }
        let data = pack_rows(src, rect);
        let bytes_per_row = u32::try_from(dim(rect.width) * src.format().bytes_per_pixel())
            .map_err(|_| GpuError::Unsupported("upload row too wide"))?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: dst_rect.x.unsigned_abs(),
                    y: dst_rect.y.unsigned_abs(),
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(copy.height),
            },
            copy,
        );
        Ok(())
    }

    fn import_shared(&self, desc: &SharedTextureDescriptor) -> Result<TextureId, GpuError> {
        log::debug!("cannot import {:?} into a wgpu context", desc.handle);
        Err(GpuError::Unsupported("shared handle import"))
    }

    fn delete_texture(&self, texture: TextureId) {
        debug_assert!(
            self.owner.is_owner_thread(),
            "textures are deleted on the owner thread"
        );
        match self.textures.lock().remove(&texture) {
            Some(t) => t.destroy(),
            None => log::warn!("{texture:?}: deleted twice"),
        }
    }
}
