// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU pixel surfaces.
//!
//! Color pixels are premultiplied BGRA, four bytes in `[b, g, r, a]` order.
//! Single-channel surfaces (alpha masks, YCbCr planes) use one byte per
//! pixel. [`SurfaceRef`] and [`SurfaceMut`] are borrowed views with an
//! explicit row pitch, so the same primitives work on owned
//! [`ImageSurface`]s, mapped shared memory and caller-provided planes.

use strata_core::descriptor::ContentType;
use strata_core::geometry::{IntPoint, IntRect, IntSize, dim};

use crate::error::SurfaceError;

/// Pixel layout of a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Premultiplied BGRA.
    Bgra32,
    /// BGR with an ignored fourth byte.
    Bgrx32,
    /// One byte per pixel.
    A8,
}

impl ImageFormat {
    /// Bytes per pixel.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra32 | Self::Bgrx32 => 4,
            Self::A8 => 1,
        }
    }

    /// The format used to store buffers of `content_type`.
    #[inline]
    #[must_use]
    pub const fn for_content(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Color => Self::Bgrx32,
            ContentType::ColorAlpha => Self::Bgra32,
            ContentType::Alpha => Self::A8,
        }
    }

    /// The content type this format stores.
    #[inline]
    #[must_use]
    pub const fn content_type(self) -> ContentType {
        match self {
            Self::Bgrx32 => ContentType::Color,
            Self::Bgra32 => ContentType::ColorAlpha,
            Self::A8 => ContentType::Alpha,
        }
    }

    /// Tightly packed row pitch for `width` pixels.
    #[inline]
    #[must_use]
    pub fn min_stride(self, width: i32) -> usize {
        dim(width) * self.bytes_per_pixel()
    }
}

fn check_layout(len: usize, size: IntSize, stride: usize, format: ImageFormat) -> Result<(), SurfaceError> {
    let row = format.min_stride(size.width);
    let rows = dim(size.height);
    let needed = if rows == 0 { 0 } else { stride * (rows - 1) + row };
    if stride < row || len < needed {
        return Err(SurfaceError::BadLayout { len, size, stride });
    }
    Ok(())
}

/// Converts one pixel between formats. Single-channel values travel in the
/// alpha byte.
#[inline]
fn convert(px: [u8; 4], to: ImageFormat) -> [u8; 4] {
    match to {
        ImageFormat::Bgra32 | ImageFormat::A8 => px,
        ImageFormat::Bgrx32 => [px[0], px[1], px[2], 0xFF],
    }
}

// ---------------------------------------------------------------------------
// Owned surface
// ---------------------------------------------------------------------------

/// An owned, tightly packed pixel surface.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageSurface {
    data: Vec<u8>,
    size: IntSize,
    format: ImageFormat,
}

impl core::fmt::Debug for ImageSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageSurface")
            .field("size", &self.size)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ImageSurface {
    /// Creates a zero-filled (transparent) surface.
    #[must_use]
    pub fn new(size: IntSize, format: ImageFormat) -> Self {
        Self {
            data: vec![0; format.min_stride(size.width) * dim(size.height)],
            size,
            format,
        }
    }

    /// Wraps tightly packed pixel data.
    pub fn from_data(data: Vec<u8>, size: IntSize, format: ImageFormat) -> Result<Self, SurfaceError> {
        let stride = format.min_stride(size.width);
        check_layout(data.len(), size, stride, format)?;
        Ok(Self { data, size, format })
    }

    /// Pixel dimensions.
    #[inline]
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.size
    }

    /// Pixel layout.
    #[inline]
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Row pitch in bytes.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.format.min_stride(self.size.width)
    }

    /// Raw bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Borrowed read view.
    #[must_use]
    pub fn view(&self) -> SurfaceRef<'_> {
        SurfaceRef {
            data: &self.data,
            size: self.size,
            stride: self.stride(),
            format: self.format,
        }
    }

    /// Borrowed write view.
    #[must_use]
    pub fn view_mut(&mut self) -> SurfaceMut<'_> {
        let stride = self.stride();
        SurfaceMut {
            data: &mut self.data,
            size: self.size,
            stride,
            format: self.format,
        }
    }

    /// Reads one pixel as BGRA.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        self.view().pixel(x, y)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A read-only view of pixels with an explicit row pitch.
#[derive(Clone, Copy)]
pub struct SurfaceRef<'a> {
    data: &'a [u8],
    size: IntSize,
    stride: usize,
    format: ImageFormat,
}

impl core::fmt::Debug for SurfaceRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SurfaceRef")
            .field("size", &self.size)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl<'a> SurfaceRef<'a> {
    /// Wraps `data` laid out as `size` pixels at `stride` bytes per row.
    pub fn new(
        data: &'a [u8],
        size: IntSize,
        stride: usize,
        format: ImageFormat,
    ) -> Result<Self, SurfaceError> {
        check_layout(data.len(), size, stride, format)?;
        Ok(Self {
            data,
            size,
            stride,
            format,
        })
    }

    /// Wraps tightly packed data whose layout the caller has already checked.
    pub(crate) fn packed(data: &'a [u8], size: IntSize, format: ImageFormat) -> Self {
        let stride = format.min_stride(size.width);
        debug_assert!(
            check_layout(data.len(), size, stride, format).is_ok(),
            "packed surface smaller than its size"
        );
        Self {
            data,
            size,
            stride,
            format,
        }
    }

    /// Pixel dimensions.
    #[inline]
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.size
    }

    /// Bounds at the origin.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.size)
    }

    /// Row pitch in bytes.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel layout.
    #[inline]
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// The bytes of row `y` (exactly `width * bpp` long).
    #[inline]
    #[must_use]
    pub fn row(&self, y: i32) -> &'a [u8] {
        let start = dim(y) * self.stride;
        &self.data[start..start + self.format.min_stride(self.size.width)]
    }

    /// Reads one pixel as BGRA. Single-channel values are returned in the
    /// alpha byte; out-of-bounds reads are transparent.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        if !self.bounds().contains_point(IntPoint::new(x, y)) {
            return [0; 4];
        }
        let bpp = self.format.bytes_per_pixel();
        let at = dim(y) * self.stride + dim(x) * bpp;
        match self.format {
            ImageFormat::Bgra32 => [
                self.data[at],
                self.data[at + 1],
                self.data[at + 2],
                self.data[at + 3],
            ],
            ImageFormat::Bgrx32 => [self.data[at], self.data[at + 1], self.data[at + 2], 0xFF],
            ImageFormat::A8 => [0, 0, 0, self.data[at]],
        }
    }
}

/// A writable view of pixels with an explicit row pitch.
pub struct SurfaceMut<'a> {
    data: &'a mut [u8],
    size: IntSize,
    stride: usize,
    format: ImageFormat,
}

impl core::fmt::Debug for SurfaceMut<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SurfaceMut")
            .field("size", &self.size)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl<'a> SurfaceMut<'a> {
    /// Wraps `data` laid out as `size` pixels at `stride` bytes per row.
    pub fn new(
        data: &'a mut [u8],
        size: IntSize,
        stride: usize,
        format: ImageFormat,
    ) -> Result<Self, SurfaceError> {
        check_layout(data.len(), size, stride, format)?;
        Ok(Self {
            data,
            size,
            stride,
            format,
        })
    }

    /// Wraps tightly packed data whose layout the caller has already checked.
    pub(crate) fn packed(data: &'a mut [u8], size: IntSize, format: ImageFormat) -> Self {
        let stride = format.min_stride(size.width);
        debug_assert!(
            check_layout(data.len(), size, stride, format).is_ok(),
            "packed surface smaller than its size"
        );
        Self {
            data,
            size,
            stride,
            format,
        }
    }

    /// Reborrows as a read-only view.
    #[must_use]
    pub fn as_view(&self) -> SurfaceRef<'_> {
        SurfaceRef {
            data: &*self.data,
            size: self.size,
            stride: self.stride,
            format: self.format,
        }
    }

    /// Pixel dimensions.
    #[inline]
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.size
    }

    /// Bounds at the origin.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.size)
    }

    /// Pixel layout.
    #[inline]
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Writes one BGRA pixel; single-channel surfaces take the alpha byte.
    /// Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, px: [u8; 4]) {
        if !self.bounds().contains_point(IntPoint::new(x, y)) {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let at = dim(y) * self.stride + dim(x) * bpp;
        match self.format {
            ImageFormat::A8 => self.data[at] = px[3],
            ImageFormat::Bgra32 | ImageFormat::Bgrx32 => {
                self.data[at..at + 4].copy_from_slice(&convert(px, self.format));
            }
        }
    }

    /// Fills `rect` (clipped to the surface) with a BGRA value.
    pub fn fill_rect(&mut self, rect: IntRect, px: [u8; 4]) {
        let r = rect.intersect(&self.bounds());
        if r.is_empty() {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let px = convert(px, self.format);
        for y in r.y..r.bottom() {
            let start = dim(y) * self.stride + dim(r.x) * bpp;
            let row = &mut self.data[start..start + dim(r.width) * bpp];
            match self.format {
                ImageFormat::A8 => row.fill(px[3]),
                ImageFormat::Bgra32 | ImageFormat::Bgrx32 => {
                    for chunk in row.chunks_exact_mut(4) {
                        chunk.copy_from_slice(&px);
                    }
                }
            }
        }
    }

    /// Copies `src_rect` of `src` so that its top-left lands on `dst_origin`.
    ///
    /// Both ends are clipped. Pixels are converted when the formats differ.
    pub fn copy_from(&mut self, src: &SurfaceRef<'_>, src_rect: IntRect, dst_origin: IntPoint) {
        let offset = dst_origin - src_rect.origin();
        let r = src_rect
            .intersect(&src.bounds())
            .translate(offset)
            .intersect(&self.bounds());
        if r.is_empty() {
            return;
        }
        let sx = r.x - offset.x;
        let sy = r.y - offset.y;
        if src.format == self.format {
            let bpp = self.format.bytes_per_pixel();
            let len = dim(r.width) * bpp;
            for row in 0..r.height {
                let s = dim(sy + row) * src.stride + dim(sx) * bpp;
                let d = dim(r.y + row) * self.stride + dim(r.x) * bpp;
                self.data[d..d + len].copy_from_slice(&src.data[s..s + len]);
            }
            return;
        }
        for row in 0..r.height {
            for col in 0..r.width {
                let px = src.pixel(sx + col, sy + row);
                self.set_pixel(r.x + col, r.y + row, px);
            }
        }
    }

    /// Copies a caller-provided plane of `size` pixels whose rows are
    /// `src_stride` bytes apart into the top-left of this surface.
    ///
    /// Rows are copied one at a time so the source pitch may differ from the
    /// destination's. A plane larger than the surface, or shorter than its
    /// declared layout, is clamped. Returns the extent actually copied.
    pub fn copy_plane(&mut self, src: &[u8], src_stride: usize, size: IntSize) -> IntSize {
        let bpp = self.format.bytes_per_pixel();
        let width = size.width.min(self.size.width).max(0);
        let mut height = size.height.min(self.size.height).max(0);
        let row_len = dim(width) * bpp;
        if src_stride < row_len {
            return IntSize::ZERO;
        }
        // Drop trailing rows the source cannot supply.
        while height > 0 && dim(height - 1) * src_stride + row_len > src.len() {
            height -= 1;
        }
        for y in 0..dim(height) {
            let s = y * src_stride;
            let d = y * self.stride;
            self.data[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
        }
        IntSize::new(width, height)
    }
}
