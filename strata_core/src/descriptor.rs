// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer handles that cross the process boundary.
//!
//! A [`SurfaceDescriptor`] names one pixel buffer, either a shared-memory
//! segment or a GPU-shareable texture handle. Descriptors are plain values:
//! holding one grants nothing until it is opened through the allocator that
//! issued it. Ownership of the underlying buffer moves between the content
//! and compositor sides by sending the descriptor, never by sharing access.

use core::fmt;

use crate::geometry::{IntPoint, IntRect, IntSize, dim};

/// What kind of pixels a buffer holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Opaque color; the alpha channel is ignored.
    Color,
    /// Color with alpha.
    #[default]
    ColorAlpha,
    /// Alpha (or single-channel luma/chroma) only.
    Alpha,
}

impl ContentType {
    /// Bytes per pixel for buffers of this content type.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Color | Self::ColorAlpha => 4,
            Self::Alpha => 1,
        }
    }
}

/// Identifier of a shared-memory segment within its pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

/// A shared-memory pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShmemDescriptor {
    /// Segment identifier.
    pub id: BufferId,
    /// Pixel dimensions.
    pub size: IntSize,
    /// Pixel format family.
    pub content_type: ContentType,
}

impl ShmemDescriptor {
    /// Row pitch in bytes. Shared-memory buffers are tightly packed.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        dim(self.size.width) * self.content_type.bytes_per_pixel()
    }

    /// Total byte length of the segment.
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.stride() * dim(self.size.height)
    }
}

/// How a shared GPU handle may be consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShareType {
    /// Importable by any context in the producing process.
    SameProcess,
    /// Importable from another process.
    CrossProcess,
}

/// An opaque GPU-shareable texture handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub u64);

impl fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedHandle({:#x})", self.0)
    }
}

/// A texture that already lives in a GPU-shareable handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SharedTextureDescriptor {
    /// Sharing scope of the handle.
    pub share_type: ShareType,
    /// The handle itself.
    pub handle: SharedHandle,
    /// Pixel dimensions.
    pub size: IntSize,
    /// Whether rows are stored bottom-up.
    pub inverted: bool,
}

/// Backend kind of a [`SurfaceDescriptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Shared-memory segment.
    Shmem,
    /// GPU shared handle.
    SharedTexture,
}

/// A serializable handle to one cross-process pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceDescriptor {
    /// Shared-memory segment.
    Shmem(ShmemDescriptor),
    /// GPU shared handle.
    SharedTexture(SharedTextureDescriptor),
}

impl SurfaceDescriptor {
    /// Backend kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> TextureKind {
        match self {
            Self::Shmem(_) => TextureKind::Shmem,
            Self::SharedTexture(_) => TextureKind::SharedTexture,
        }
    }

    /// Pixel dimensions.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> IntSize {
        match self {
            Self::Shmem(d) => d.size,
            Self::SharedTexture(d) => d.size,
        }
    }

    /// Content type. Shared GPU handles always carry alpha.
    #[inline]
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        match self {
            Self::Shmem(d) => d.content_type,
            Self::SharedTexture(_) => ContentType::ColorAlpha,
        }
    }

    /// The shared-memory descriptor, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_shmem(&self) -> Option<&ShmemDescriptor> {
        match self {
            Self::Shmem(d) => Some(d),
            Self::SharedTexture(_) => None,
        }
    }
}

impl From<ShmemDescriptor> for SurfaceDescriptor {
    fn from(d: ShmemDescriptor) -> Self {
        Self::Shmem(d)
    }
}

impl From<SharedTextureDescriptor> for SurfaceDescriptor {
    fn from(d: SharedTextureDescriptor) -> Self {
        Self::SharedTexture(d)
    }
}

/// A plane of a planar YCbCr image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Plane {
    /// Luma.
    Y = 0,
    /// Blue-difference chroma.
    Cb = 1,
    /// Red-difference chroma.
    Cr = 2,
}

impl Plane {
    /// All planes in index order.
    pub const ALL: [Self; 3] = [Self::Y, Self::Cb, Self::Cr];

    /// The fixed descriptor index of this plane.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Looks up a plane by descriptor index.
    #[must_use]
    pub const fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Y),
            1 => Some(Self::Cb),
            2 => Some(Self::Cr),
            _ => None,
        }
    }
}

/// A three-plane YCbCr image plus its visible crop window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct YuvImage {
    /// Luma plane.
    pub y: SurfaceDescriptor,
    /// Blue-difference plane.
    pub u: SurfaceDescriptor,
    /// Red-difference plane.
    pub v: SurfaceDescriptor,
    /// Visible window within the luma plane.
    pub picture_rect: IntRect,
}

impl YuvImage {
    /// Returns the descriptor for `plane`.
    #[inline]
    #[must_use]
    pub const fn plane(&self, plane: Plane) -> &SurfaceDescriptor {
        match plane {
            Plane::Y => &self.y,
            Plane::Cb => &self.u,
            Plane::Cr => &self.v,
        }
    }

    /// The three descriptors in plane-index order.
    #[inline]
    #[must_use]
    pub const fn planes(&self) -> [SurfaceDescriptor; 3] {
        [self.y, self.u, self.v]
    }

    /// Returns `true` if the picture rect lies inside the luma plane.
    #[must_use]
    pub fn has_valid_picture_rect(&self) -> bool {
        IntRect::from_size(self.y.size()).contains(&self.picture_rect)
    }
}

/// An image owned by the compositor and referred to by id only.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedImageId(pub u64);

impl fmt::Debug for SharedImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedImageId({})", self.0)
    }
}

/// The transport payload for one logical image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SharedImage {
    /// A single buffer.
    Surface(SurfaceDescriptor),
    /// Three planes and a picture rect.
    Yuv(YuvImage),
    /// An image the compositor already holds.
    External(SharedImageId),
}

impl SharedImage {
    /// Short name of the active variant, for diagnostics.
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Surface(_) => "Surface",
            Self::Yuv(_) => "Yuv",
            Self::External(_) => "External",
        }
    }
}

/// Where a rotated buffer's content sits.
///
/// `rect` is the layer-space area the buffer covers. `rotation` is the buffer
/// position holding the top-left of `rect`; content wraps around the buffer
/// edges. The two always change together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferRect {
    /// Layer-space area covered by the buffer.
    pub rect: IntRect,
    /// Buffer position of `rect`'s top-left corner.
    pub rotation: IntPoint,
}

impl BufferRect {
    /// An unrotated buffer covering `rect`.
    #[inline]
    #[must_use]
    pub const fn unrotated(rect: IntRect) -> Self {
        Self {
            rect,
            rotation: IntPoint::ZERO,
        }
    }

    /// Returns `true` if the rotation lies within the buffer.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.rotation.x >= 0
            && self.rotation.y >= 0
            && (self.rotation.x < self.rect.width || self.rotation.x == 0)
            && (self.rotation.y < self.rect.height || self.rotation.y == 0)
    }
}

/// A painted-layer buffer: descriptor plus geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThebesBuffer {
    /// The pixel buffer.
    pub descriptor: SurfaceDescriptor,
    /// Layer-space rect and rotation of its content.
    pub geometry: BufferRect,
}

/// Which compositable a texture belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositableKind {
    /// Painted content; host swaps front and back.
    ContentDirect,
    /// Painted content; host uploads into its own texture.
    ContentTexture,
    /// Single shared-memory image.
    ImageTexture,
    /// Single image in a GPU shared handle.
    ImageShared,
    /// Planar YCbCr image.
    ImageYuv,
}

impl CompositableKind {
    /// Returns `true` for painted-content compositables.
    #[inline]
    #[must_use]
    pub const fn is_content(self) -> bool {
        matches!(self, Self::ContentDirect | Self::ContentTexture)
    }
}

/// Names the logical texture a message concerns.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureIdentifier {
    /// Owning compositable kind.
    pub compositable: CompositableKind,
    /// Buffer backend.
    pub texture: TextureKind,
    /// Descriptor index; the [`Plane`] index for YCbCr images.
    pub index: u32,
}

impl TextureIdentifier {
    /// Identifier for a single-texture compositable.
    #[inline]
    #[must_use]
    pub const fn new(compositable: CompositableKind, texture: TextureKind) -> Self {
        Self {
            compositable,
            texture,
            index: 0,
        }
    }

    /// Identifier for one plane of a YCbCr image.
    #[inline]
    #[must_use]
    pub const fn plane(plane: Plane) -> Self {
        Self {
            compositable: CompositableKind::ImageYuv,
            texture: TextureKind::Shmem,
            index: plane.index(),
        }
    }
}

impl fmt::Debug for TextureIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TextureIdentifier({:?}/{:?}#{})",
            self.compositable, self.texture, self.index
        )
    }
}

/// Sampling filter used when compositing a texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Nearest-neighbor.
    Nearest,
    /// Bilinear.
    #[default]
    Linear,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shmem(id: u64, w: i32, h: i32) -> SurfaceDescriptor {
        SurfaceDescriptor::Shmem(ShmemDescriptor {
            id: BufferId(id),
            size: IntSize::new(w, h),
            content_type: ContentType::Alpha,
        })
    }

    #[test]
    fn plane_indices_are_fixed() {
        for (i, p) in Plane::ALL.iter().enumerate() {
            assert_eq!(p.index() as usize, i, "plane order is Y, Cb, Cr");
            assert_eq!(Plane::from_index(p.index()), Some(*p), "index maps back");
        }
        assert_eq!(Plane::from_index(3), None, "only three planes");
    }

    #[test]
    fn yuv_picture_rect_validation() {
        let mut img = YuvImage {
            y: shmem(1, 64, 48),
            u: shmem(2, 32, 24),
            v: shmem(3, 32, 24),
            picture_rect: IntRect::new(0, 0, 64, 48),
        };
        assert!(img.has_valid_picture_rect(), "full plane is valid");
        img.picture_rect = IntRect::new(8, 0, 64, 48);
        assert!(!img.has_valid_picture_rect(), "overhang is invalid");
    }

    #[test]
    fn shmem_stride_is_tight() {
        let d = ShmemDescriptor {
            id: BufferId(9),
            size: IntSize::new(10, 3),
            content_type: ContentType::ColorAlpha,
        };
        assert_eq!(d.stride(), 40, "4 bytes per pixel");
        assert_eq!(d.byte_len(), 120, "stride times height");
    }

    #[test]
    fn buffer_rect_rotation_bounds() {
        let mut g = BufferRect::unrotated(IntRect::new(0, 0, 10, 10));
        assert!(g.is_valid(), "zero rotation is valid");
        g.rotation = IntPoint::new(9, 3);
        assert!(g.is_valid(), "rotation inside buffer is valid");
        g.rotation = IntPoint::new(10, 0);
        assert!(!g.is_valid(), "rotation must wrap");
    }
}
