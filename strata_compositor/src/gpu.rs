// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU context abstraction and owned textures.
//!
//! A [`GpuContext`] belongs to one thread: the one whose
//! [`TaskQueue`](strata_surface::handoff::TaskQueue) its
//! [`owner`](GpuContext::owner) handle posts to. Textures may be created,
//! uploaded and sampled through a shared reference, but deletion must happen
//! on the owner thread. [`GpuTexture`] enforces that on drop: a texture
//! released elsewhere posts its deletion to the owner's queue instead of
//! deleting in place.

use std::sync::Arc;

use strata_core::descriptor::{ContentType, SharedTextureDescriptor};
use strata_core::geometry::{IntPoint, IntRect, IntSize};
use strata_surface::handoff::{Dispatch, OwnerHandle};
use strata_surface::image::{ImageFormat, SurfaceRef};

use crate::error::GpuError;

/// Identifier of a texture within its context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl core::fmt::Debug for TextureId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}

/// Texel layout of a GPU texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Premultiplied BGRA.
    Bgra8,
    /// BGR, alpha ignored.
    Bgrx8,
    /// Single channel (alpha masks and YCbCr planes).
    R8,
}

impl TextureFormat {
    /// The texture format that holds buffers of `content_type`.
    #[must_use]
    pub const fn for_content(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Color => Self::Bgrx8,
            ContentType::ColorAlpha => Self::Bgra8,
            ContentType::Alpha => Self::R8,
        }
    }

    /// The matching CPU surface format.
    #[must_use]
    pub const fn image_format(self) -> ImageFormat {
        match self {
            Self::Bgra8 => ImageFormat::Bgra32,
            Self::Bgrx8 => ImageFormat::Bgrx32,
            Self::R8 => ImageFormat::A8,
        }
    }
}

/// A device that owns textures.
pub trait GpuContext: Send + Sync {
    /// Handle to the thread that owns this context.
    fn owner(&self) -> &OwnerHandle;

    /// Creates an uninitialized texture.
    fn create_texture(&self, size: IntSize, format: TextureFormat) -> Result<TextureId, GpuError>;

    /// Copies `src_rect` of `src` into `texture` at `dst`.
    fn upload(
        &self,
        texture: TextureId,
        dst: IntPoint,
        src: &SurfaceRef<'_>,
        src_rect: IntRect,
    ) -> Result<(), GpuError>;

    /// Makes a shared handle usable as a texture of this context.
    fn import_shared(&self, desc: &SharedTextureDescriptor) -> Result<TextureId, GpuError>;

    /// Deletes a texture. Only called on the owner thread.
    fn delete_texture(&self, texture: TextureId);
}

/// A texture that deletes itself on its context's owner thread.
pub struct GpuTexture {
    context: Arc<dyn GpuContext>,
    id: TextureId,
    size: IntSize,
    format: TextureFormat,
}

impl core::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl GpuTexture {
    /// Creates a texture in `context`.
    pub fn new(
        context: &Arc<dyn GpuContext>,
        size: IntSize,
        format: TextureFormat,
    ) -> Result<Self, GpuError> {
        let id = context.create_texture(size, format)?;
        Ok(Self {
            context: Arc::clone(context),
            id,
            size,
            format,
        })
    }

    /// Imports a shared handle into `context`.
    pub fn import(
        context: &Arc<dyn GpuContext>,
        desc: &SharedTextureDescriptor,
    ) -> Result<Self, GpuError> {
        let id = context.import_shared(desc)?;
        Ok(Self {
            context: Arc::clone(context),
            id,
            size: desc.size,
            format: TextureFormat::Bgra8,
        })
    }

    /// The texture id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Texel dimensions.
    #[inline]
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.size
    }

    /// Texel layout.
    #[inline]
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Copies `src_rect` of `src` into this texture at `dst`.
    pub fn upload(&self, dst: IntPoint, src: &SurfaceRef<'_>, src_rect: IntRect) -> Result<(), GpuError> {
        self.context.upload(self.id, dst, src, src_rect)
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        let id = self.id;
        let context = Arc::clone(&self.context);
        match self
            .context
            .owner()
            .run_or_post(Box::new(move || context.delete_texture(id)))
        {
            Ok(Dispatch::Inline) => {}
            Ok(Dispatch::Deferred) => log::trace!("{id:?}: deletion deferred to owner thread"),
            Err(e) => log::warn!("{id:?} leaked: {e}"),
        }
    }
}
