// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rotated-buffer addressing.
//!
//! A painted layer's buffer can be scrolled without moving pixels: the
//! [`BufferRect`] records which buffer position holds the top-left of the
//! covered layer rect, and content wraps around the buffer edges. A layer
//! rect therefore maps to up to four buffer rects, one per quadrant:
//!
//! ```text
//!   layer space                      buffer
//!   ┌────────┬────┐                  ┌────┬────────┐
//!   │   TL   │ TR │                  │ BR │   BL   │
//!   ├────────┼────┤        ─▶        ├────┼────────┤
//!   │   BL   │ BR │                  │ TR │   TL   │
//!   └────────┴────┘                  └────┴────────┘
//! ```

use strata_core::descriptor::BufferRect;
use strata_core::geometry::{IntPoint, IntRect};
use strata_core::region::IntRegion;

use crate::image::{ImageSurface, SurfaceMut, SurfaceRef};

/// One quadrant of a rotated buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quadrant {
    /// Layer-space area of the quadrant.
    pub logical: IntRect,
    /// Buffer position of `logical`'s top-left corner.
    pub buffer_origin: IntPoint,
}

impl Quadrant {
    /// Maps a layer-space rect inside this quadrant into buffer space.
    #[inline]
    #[must_use]
    pub fn to_buffer(&self, rect: IntRect) -> IntRect {
        rect.translate(self.buffer_origin - self.logical.origin())
    }
}

/// The non-empty quadrants of `geom`.
#[must_use]
pub fn quadrants(geom: &BufferRect) -> Vec<Quadrant> {
    let r = geom.rect;
    let rot = geom.rotation;
    let split_x = r.x + r.width - rot.x;
    let split_y = r.y + r.height - rot.y;
    [
        (
            IntRect::from_edges(r.x, r.y, split_x, split_y),
            IntPoint::new(rot.x, rot.y),
        ),
        (
            IntRect::from_edges(split_x, r.y, r.right(), split_y),
            IntPoint::new(0, rot.y),
        ),
        (
            IntRect::from_edges(r.x, split_y, split_x, r.bottom()),
            IntPoint::new(rot.x, 0),
        ),
        (
            IntRect::from_edges(split_x, split_y, r.right(), r.bottom()),
            IntPoint::ZERO,
        ),
    ]
    .into_iter()
    .filter(|(logical, _)| !logical.is_empty())
    .map(|(logical, buffer_origin)| Quadrant {
        logical,
        buffer_origin,
    })
    .collect()
}

/// Splits `rect` (clipped to the covered area) into `(layer, buffer)` pairs.
#[must_use]
pub fn map_rect(geom: &BufferRect, rect: IntRect) -> Vec<(IntRect, IntRect)> {
    quadrants(geom)
        .iter()
        .filter_map(|q| {
            let piece = q.logical.intersect(&rect);
            (!piece.is_empty()).then(|| (piece, q.to_buffer(piece)))
        })
        .collect()
}

/// Splits every rect of `region` into `(layer, buffer)` pairs.
#[must_use]
pub fn map_region(geom: &BufferRect, region: &IntRegion) -> Vec<(IntRect, IntRect)> {
    region
        .rects()
        .iter()
        .flat_map(|r| map_rect(geom, *r))
        .collect()
}

/// The buffer-space area holding `region`.
#[must_use]
pub fn buffer_region(geom: &BufferRect, region: &IntRegion) -> IntRegion {
    let mut out = IntRegion::new();
    for (_, buffer) in map_region(geom, region) {
        out.union_rect(buffer);
    }
    out
}

/// Geometry for reusing a buffer of the same size to cover `new_rect`.
///
/// Content that stays inside both rects keeps its buffer position; the
/// rotation absorbs the move.
#[must_use]
pub fn rotate_geometry(geom: &BufferRect, new_rect: IntRect) -> BufferRect {
    debug_assert_eq!(
        geom.rect.size(),
        new_rect.size(),
        "rotation only applies to a same-size buffer"
    );
    let w = new_rect.width.max(1);
    let h = new_rect.height.max(1);
    let delta = new_rect.origin() - geom.rect.origin();
    BufferRect {
        rect: new_rect,
        rotation: IntPoint::new(
            (geom.rotation.x + delta.x).rem_euclid(w),
            (geom.rotation.y + delta.y).rem_euclid(h),
        ),
    }
}

/// Copies the layer-space `region` from one rotated buffer to another.
///
/// Only the part of `region` covered by both geometries is copied.
pub fn copy_region(
    src: &SurfaceRef<'_>,
    src_geom: &BufferRect,
    dst: &mut SurfaceMut<'_>,
    dst_geom: &BufferRect,
    region: &IntRegion,
) {
    for (logical, src_buf) in map_region(src_geom, region) {
        for (piece, dst_buf) in map_rect(dst_geom, logical) {
            let src_rect = piece.translate(src_buf.origin() - logical.origin());
            dst.copy_from(src, src_rect, dst_buf.origin());
        }
    }
}

/// Rearranges `surface` in place so its content is unrotated.
///
/// Returns the new geometry. Used when the caller cannot paint across the
/// buffer's wrap edges.
pub fn unrotate(surface: &mut SurfaceMut<'_>, geom: &BufferRect) -> BufferRect {
    let flat = BufferRect::unrotated(geom.rect);
    if geom.rotation == IntPoint::ZERO {
        return flat;
    }
    let mut scratch = ImageSurface::new(surface.size(), surface.format());
    let all = IntRegion::from_rect(geom.rect);
    copy_region(
        &surface.as_view(),
        geom,
        &mut scratch.view_mut(),
        &flat,
        &all,
    );
    surface.copy_from(
        &scratch.view(),
        IntRect::from_size(scratch.size()),
        IntPoint::ZERO,
    );
    flat
}
