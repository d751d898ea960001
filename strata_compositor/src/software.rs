// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU implementations of [`GpuContext`] and [`Compositor`].
//!
//! Textures are [`ImageSurface`]s behind shared locks, so an imported shared
//! handle aliases the producer's pixels instead of copying them. Quads are
//! rasterized per target pixel: each pixel center is mapped back through the
//! inverse transform into the quad, sampled, and blended source-over in
//! premultiplied space.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use kurbo::{Affine, Point, Rect, Vec2};
use parking_lot::{Mutex, RwLock};
use strata_core::descriptor::{Filter, SharedTextureDescriptor};
use strata_core::geometry::{IntPoint, IntRect, IntSize};
use strata_surface::handoff::OwnerHandle;
use strata_surface::image::{ImageFormat, ImageSurface, SurfaceMut, SurfaceRef};
use strata_surface::shared_handle::{SharedHandleTable, SharedSurface};

use crate::compositor::{Compositor, RenderTargetId};
use crate::effect::{Effect, EffectChain};
use crate::error::GpuError;
use crate::gpu::{GpuContext, TextureFormat, TextureId};

/// Largest texture edge [`SoftwareContext`] will allocate.
pub const MAX_TEXTURE_SIZE: i32 = 8192;

// ---------------------------------------------------------------------------
// SoftwareContext
// ---------------------------------------------------------------------------

/// A [`GpuContext`] whose textures live in CPU memory.
pub struct SoftwareContext {
    owner: OwnerHandle,
    shared: Option<Arc<SharedHandleTable>>,
    textures: Mutex<HashMap<TextureId, SharedSurface>>,
    next: AtomicU64,
}

impl core::fmt::Debug for SoftwareContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoftwareContext")
            .field("owner", &self.owner)
            .field("textures", &self.textures.lock().len())
            .finish_non_exhaustive()
    }
}

impl SoftwareContext {
    /// Creates a context owned by `owner`'s thread.
    #[must_use]
    pub fn new(owner: OwnerHandle) -> Self {
        Self {
            owner,
            shared: None,
            textures: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Creates a context that can import handles from `table`.
    #[must_use]
    pub fn with_shared_handles(owner: OwnerHandle, table: Arc<SharedHandleTable>) -> Self {
        Self {
            shared: Some(table),
            ..Self::new(owner)
        }
    }

    /// The pixels of a live texture.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<SharedSurface> {
        self.textures.lock().get(&id).cloned()
    }

    /// Number of live textures.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    fn insert(&self, surface: SharedSurface) -> TextureId {
        let id = TextureId(self.next.fetch_add(1, Ordering::Relaxed));
        self.textures.lock().insert(id, surface);
        id
    }
}

impl GpuContext for SoftwareContext {
    fn owner(&self) -> &OwnerHandle {
        &self.owner
    }

    fn create_texture(&self, size: IntSize, format: TextureFormat) -> Result<TextureId, GpuError> {
        if size.is_empty() {
            return Err(GpuError::AllocationFailed {
                size,
                reason: "empty size",
            });
        }
        if size.width > MAX_TEXTURE_SIZE || size.height > MAX_TEXTURE_SIZE {
            return Err(GpuError::AllocationFailed {
                size,
                reason: "exceeds maximum texture size",
            });
        }
        let id = self.insert(Arc::new(RwLock::new(ImageSurface::new(
            size,
            format.image_format(),
        ))));
        log::trace!("created {id:?} {size:?} {format:?}");
        Ok(id)
    }

    fn upload(
        &self,
        texture: TextureId,
        dst: IntPoint,
        src: &SurfaceRef<'_>,
        src_rect: IntRect,
    ) -> Result<(), GpuError> {
        let surface = self
            .texture(texture)
            .ok_or(GpuError::UnknownTexture(texture))?;
        surface.write().view_mut().copy_from(src, src_rect, dst);
        Ok(())
    }

    fn import_shared(&self, desc: &SharedTextureDescriptor) -> Result<TextureId, GpuError> {
        let table = self
            .shared
            .as_ref()
            .ok_or(GpuError::Unsupported("context has no shared handle table"))?;
        let surface = table
            .surface(desc.handle)
            .ok_or(GpuError::UnknownHandle(desc.handle))?;
        Ok(self.insert(surface))
    }

    fn delete_texture(&self, texture: TextureId) {
        debug_assert!(
            self.owner.is_owner_thread(),
            "{texture:?} deleted off its owner thread"
        );
        if self.textures.lock().remove(&texture).is_none() {
            log::warn!("deleting unknown {texture:?}");
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// A premultiplied color with a separate alpha per color channel.
#[derive(Clone, Copy, Debug)]
struct Sample {
    rgb: [f64; 3],
    alpha: [f64; 3],
    a: f64,
}

impl Sample {
    fn premultiplied(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            rgb: [r, g, b],
            alpha: [a; 3],
            a,
        }
    }

    /// From a `[b, g, r, a]` texel.
    fn from_bgra(px: [f64; 4]) -> Self {
        Self::premultiplied(px[2], px[1], px[0], px[3])
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "sample coordinates are bounded by texture sizes"
)]
fn floor_i32(v: f64) -> i32 {
    v.floor() as i32
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to [0, 255] before the cast"
)]
fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn texel(src: &SurfaceRef<'_>, x: i32, y: i32, clamp: IntRect) -> [f64; 4] {
    let x = x.clamp(clamp.x, clamp.right() - 1);
    let y = y.clamp(clamp.y, clamp.bottom() - 1);
    src.pixel(x, y).map(|c| f64::from(c) / 255.0)
}

/// Samples `src` at `p` (texel units), never reading outside `clamp`.
fn sample(src: &SurfaceRef<'_>, p: Point, filter: Filter, clamp: IntRect) -> [f64; 4] {
    match filter {
        Filter::Nearest => texel(src, floor_i32(p.x), floor_i32(p.y), clamp),
        Filter::Linear => {
            let fx = p.x - 0.5;
            let fy = p.y - 0.5;
            let x0 = floor_i32(fx);
            let y0 = floor_i32(fy);
            let tx = fx - fx.floor();
            let ty = fy - fy.floor();
            let a = texel(src, x0, y0, clamp);
            let b = texel(src, x0 + 1, y0, clamp);
            let c = texel(src, x0, y0 + 1, clamp);
            let d = texel(src, x0 + 1, y0 + 1, clamp);
            core::array::from_fn(|i| {
                let top = a[i] + (b[i] - a[i]) * tx;
                let bottom = c[i] + (d[i] - c[i]) * tx;
                top + (bottom - top) * ty
            })
        }
    }
}

/// The texels `source` may read: its rounded-out bounds within `size`.
fn clamp_rect(source: Rect, size: IntSize) -> IntRect {
    let bounds = IntRect::from_size(size);
    let clamp = IntRect::round_out(source).intersect(&bounds);
    if clamp.is_empty() { bounds } else { clamp }
}

/// BT.601 limited-range YCbCr to RGB.
fn ycbcr_to_rgb(y: f64, cb: f64, cr: f64) -> [f64; 3] {
    let y = 1.164 * (y - 16.0 / 255.0);
    let cb = cb - 0.5;
    let cr = cr - 0.5;
    [
        (y + 1.596 * cr).clamp(0.0, 1.0),
        (y - 0.813 * cr - 0.391 * cb).clamp(0.0, 1.0),
        (y + 2.018 * cb).clamp(0.0, 1.0),
    ]
}

/// Blends `s` over the pixel at `(x, y)` with `coverage`.
fn blend(dst: &mut SurfaceMut<'_>, x: i32, y: i32, s: Sample, coverage: f64) {
    let d = dst.as_view().pixel(x, y).map(|c| f64::from(c) / 255.0);
    let channel = |i: usize, di: usize| s.rgb[i] * coverage + d[di] * (1.0 - s.alpha[i] * coverage);
    let r = channel(0, 2);
    let g = channel(1, 1);
    let b = channel(2, 0);
    let a = s.a * coverage + d[3] * (1.0 - s.a * coverage);
    dst.set_pixel(x, y, [to_byte(b), to_byte(g), to_byte(r), to_byte(a)]);
}

/// Pixels an effect reads, resolved and locked for one draw.
enum Source {
    Texture {
        surface: SharedSurface,
        filter: Filter,
        flipped: bool,
        opaque: bool,
    },
    YCbCr {
        planes: [SharedSurface; 3],
        filter: Filter,
    },
    ComponentAlpha {
        on_black: SharedSurface,
        on_white: SharedSurface,
        filter: Filter,
    },
    Solid(Sample),
    Target(ImageSurface),
}

impl Source {
    fn size(&self) -> Option<IntSize> {
        match self {
            Self::Texture { surface, .. } => Some(surface.read().size()),
            Self::YCbCr { planes, .. } => Some(planes[0].read().size()),
            Self::ComponentAlpha { on_black, .. } => Some(on_black.read().size()),
            Self::Solid(_) => None,
            Self::Target(s) => Some(s.size()),
        }
    }
}

/// Where a quad lands and what it samples.
struct Placement {
    device: Affine,
    rect: Rect,
    source: Rect,
    area: IntRect,
}

impl Placement {
    /// Visits each covered target pixel with the matching source point and
    /// the quad-local unit coordinates.
    fn for_each(&self, mut f: impl FnMut(i32, i32, Point, Point)) {
        if self.device.determinant().abs() < 1e-12 {
            return;
        }
        let inverse = self.device.inverse();
        for y in self.area.y..self.area.bottom() {
            for x in self.area.x..self.area.right() {
                let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if p.x < self.rect.x0 || p.x >= self.rect.x1 || p.y < self.rect.y0 || p.y >= self.rect.y1 {
                    continue;
                }
                let u = (p.x - self.rect.x0) / self.rect.width();
                let v = (p.y - self.rect.y0) / self.rect.height();
                let s = Point::new(
                    self.source.x0 + u * self.source.width(),
                    self.source.y0 + v * self.source.height(),
                );
                f(x, y, s, Point::new(u, v));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SoftwareCompositor
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct RenderTarget {
    origin: IntPoint,
    surface: ImageSurface,
}

/// A [`Compositor`] that rasterizes into CPU surfaces.
pub struct SoftwareCompositor {
    context: Arc<SoftwareContext>,
    frame: ImageSurface,
    targets: HashMap<RenderTargetId, RenderTarget>,
    current: Option<RenderTargetId>,
    next_target: u32,
}

impl core::fmt::Debug for SoftwareCompositor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoftwareCompositor")
            .field("frame", &self.frame)
            .field("targets", &self.targets.len())
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl SoftwareCompositor {
    /// Creates a compositor drawing into a transparent frame of `size`.
    #[must_use]
    pub fn new(context: Arc<SoftwareContext>, size: IntSize) -> Self {
        Self {
            context,
            frame: ImageSurface::new(size, ImageFormat::Bgra32),
            targets: HashMap::new(),
            current: None,
            next_target: 1,
        }
    }

    /// The concrete context.
    #[must_use]
    pub fn software_context(&self) -> &Arc<SoftwareContext> {
        &self.context
    }

    /// The composited frame.
    #[must_use]
    pub fn frame(&self) -> &ImageSurface {
        &self.frame
    }

    /// Pixels of an offscreen target.
    #[must_use]
    pub fn target(&self, id: RenderTargetId) -> Option<&ImageSurface> {
        self.targets.get(&id).map(|t| &t.surface)
    }

    /// Replaces the frame with a transparent one of `size`.
    pub fn resize(&mut self, size: IntSize) {
        self.frame = ImageSurface::new(size, ImageFormat::Bgra32);
    }

    fn resolve(&self, effect: &Effect) -> Result<Source, GpuError> {
        let texture = |id: TextureId| self.context.texture(id).ok_or(GpuError::UnknownTexture(id));
        Ok(match *effect {
            Effect::Bgrx {
                texture: id,
                filter,
                flipped,
            } => Source::Texture {
                surface: texture(id)?,
                filter,
                flipped,
                opaque: true,
            },
            Effect::Bgra {
                texture: id,
                filter,
                flipped,
            } => Source::Texture {
                surface: texture(id)?,
                filter,
                flipped,
                opaque: false,
            },
            Effect::YCbCr { y, cb, cr, filter } => Source::YCbCr {
                planes: [texture(y)?, texture(cb)?, texture(cr)?],
                filter,
            },
            Effect::ComponentAlpha {
                on_black,
                on_white,
                filter,
            } => Source::ComponentAlpha {
                on_black: texture(on_black)?,
                on_white: texture(on_white)?,
                filter,
            },
            Effect::SolidColor { color } => {
                let [r, g, b, a] = color.map(|c| f64::from(c).clamp(0.0, 1.0));
                Source::Solid(Sample::premultiplied(r * a, g * a, b * a, a))
            }
            Effect::RenderTarget { target } => {
                if self.current == Some(target) {
                    return Err(GpuError::Unsupported("sampling the current render target"));
                }
                let t = self.targets.get(&target).ok_or(GpuError::UnknownTarget(target))?;
                Source::Target(t.surface.clone())
            }
            Effect::Mask { .. } => return Err(GpuError::Unsupported("mask as primary effect")),
        })
    }

    fn allocate_target(&mut self, rect: IntRect) -> Result<(RenderTargetId, &mut RenderTarget), GpuError> {
        if rect.is_empty() {
            return Err(GpuError::AllocationFailed {
                size: rect.size(),
                reason: "empty render target",
            });
        }
        let id = RenderTargetId(self.next_target);
        self.next_target += 1;
        let target = self.targets.entry(id).or_insert(RenderTarget {
            origin: rect.origin(),
            surface: ImageSurface::new(rect.size(), ImageFormat::Bgra32),
        });
        Ok((id, target))
    }
}

impl Compositor for SoftwareCompositor {
    fn context(&self) -> Arc<dyn GpuContext> {
        Arc::clone(&self.context) as Arc<dyn GpuContext>
    }

    fn begin_frame(&mut self) {
        let mut view = self.frame.view_mut();
        let bounds = view.bounds();
        view.fill_rect(bounds, [0; 4]);
        self.current = None;
    }

    fn create_surface(&mut self, rect: IntRect) -> Result<RenderTargetId, GpuError> {
        let (id, _) = self.allocate_target(rect)?;
        log::trace!("created {id:?} at {rect:?}");
        Ok(id)
    }

    fn create_surface_from_surface(
        &mut self,
        rect: IntRect,
        source: RenderTargetId,
        source_point: IntPoint,
    ) -> Result<RenderTargetId, GpuError> {
        let copy = self
            .targets
            .get(&source)
            .ok_or(GpuError::UnknownTarget(source))?
            .surface
            .clone();
        let (id, target) = self.allocate_target(rect)?;
        target.surface.view_mut().copy_from(
            &copy.view(),
            IntRect::from_origin_size(source_point, rect.size()),
            IntPoint::ZERO,
        );
        Ok(id)
    }

    fn set_surface_target(&mut self, target: Option<RenderTargetId>) {
        if let Some(id) = target
            && !self.targets.contains_key(&id)
        {
            log::warn!("unknown {id:?}; drawing to the frame");
            self.current = None;
            return;
        }
        self.current = target;
    }

    fn surface_target(&self) -> Option<RenderTargetId> {
        self.current
    }

    fn destroy_surface(&mut self, target: RenderTargetId) {
        self.targets.remove(&target);
        if self.current == Some(target) {
            self.current = None;
        }
    }

    fn draw_quad(
        &mut self,
        rect: Rect,
        source_rect: Option<Rect>,
        clip: Option<IntRect>,
        effects: &EffectChain,
        opacity: f32,
        transform: Affine,
        offset: Vec2,
    ) {
        let opacity = f64::from(opacity).clamp(0.0, 1.0);
        if opacity <= 0.0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return;
        }
        let Some(primary) = effects.primary() else {
            log::trace!("quad with no primary effect");
            return;
        };
        let source = match self.resolve(primary) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("dropping quad: {e}");
                return;
            }
        };
        let mask = match effects.mask() {
            Some(Effect::Mask { texture, transform }) => match self.context.texture(*texture) {
                Some(surface) => Some((surface, *transform)),
                None => {
                    log::warn!("dropping quad: mask {texture:?} is gone");
                    return;
                }
            },
            _ => None,
        };
        let source_rect = source_rect.unwrap_or_else(|| {
            source
                .size()
                .map_or(Rect::new(0.0, 0.0, 1.0, 1.0), |s| IntRect::from_size(s).to_rect())
        });

        let (dst, origin) = match self.current.and_then(|id| self.targets.get_mut(&id)) {
            Some(t) => (&mut t.surface, t.origin),
            None => (&mut self.frame, IntPoint::ZERO),
        };
        let device = Affine::translate(-origin.to_vec2()) * Affine::translate(offset) * transform;
        let mut area = IntRect::round_out(device.transform_rect_bbox(rect))
            .intersect(&IntRect::from_size(dst.size()));
        if let Some(clip) = clip {
            area = area.intersect(&clip.translate(-origin));
        }
        if area.is_empty() {
            return;
        }
        let placement = Placement {
            device,
            rect,
            source: source_rect,
            area,
        };

        let mask_guard = mask.as_ref().map(|(m, t)| (m.read(), *t));
        let coverage = |uv: Point| -> f64 {
            let Some((m, t)) = &mask_guard else {
                return opacity;
            };
            let view = m.view();
            let at = *t * uv;
            opacity * sample(&view, at, Filter::Linear, view.bounds())[3]
        };
        let mut dst = dst.view_mut();

        match &source {
            Source::Texture {
                surface,
                filter,
                flipped,
                opaque,
            } => {
                let guard = surface.read();
                let view = guard.view();
                let h = f64::from(view.size().height);
                let clamp = if *flipped {
                    view.bounds()
                } else {
                    clamp_rect(source_rect, view.size())
                };
                placement.for_each(|x, y, s, uv| {
                    let s = if *flipped { Point::new(s.x, h - s.y) } else { s };
                    let mut px = sample(&view, s, *filter, clamp);
                    if *opaque {
                        px[3] = 1.0;
                    }
                    blend(&mut dst, x, y, Sample::from_bgra(px), coverage(uv));
                });
            }
            Source::YCbCr { planes, filter } => {
                let guards = [planes[0].read(), planes[1].read(), planes[2].read()];
                let [y_view, cb_view, cr_view] = [guards[0].view(), guards[1].view(), guards[2].view()];
                let y_size = y_view.size();
                let c_size = cb_view.size();
                let scale = Vec2::new(
                    f64::from(c_size.width) / f64::from(y_size.width.max(1)),
                    f64::from(c_size.height) / f64::from(y_size.height.max(1)),
                );
                let y_clamp = clamp_rect(source_rect, y_size);
                let c_source = Rect::new(
                    source_rect.x0 * scale.x,
                    source_rect.y0 * scale.y,
                    source_rect.x1 * scale.x,
                    source_rect.y1 * scale.y,
                );
                let c_clamp = clamp_rect(c_source, c_size);
                placement.for_each(|x, y, s, uv| {
                    let c = Point::new(s.x * scale.x, s.y * scale.y);
                    let luma = sample(&y_view, s, *filter, y_clamp)[3];
                    let cb = sample(&cb_view, c, *filter, c_clamp)[3];
                    let cr = sample(&cr_view, c, *filter, c_clamp)[3];
                    let [r, g, b] = ycbcr_to_rgb(luma, cb, cr);
                    blend(&mut dst, x, y, Sample::premultiplied(r, g, b, 1.0), coverage(uv));
                });
            }
            Source::ComponentAlpha {
                on_black,
                on_white,
                filter,
            } => {
                let black = on_black.read();
                let white = on_white.read();
                let (black, white) = (black.view(), white.view());
                let clamp = clamp_rect(source_rect, black.size());
                placement.for_each(|x, y, s, uv| {
                    let b = sample(&black, s, *filter, clamp);
                    let w = sample(&white, s, *filter, clamp);
                    // Texels are [b, g, r, a]; per-channel alpha is 1 - (white - black).
                    let alpha = [1.0 - (w[2] - b[2]), 1.0 - (w[1] - b[1]), 1.0 - (w[0] - b[0])];
                    let s = Sample {
                        rgb: [b[2], b[1], b[0]],
                        alpha,
                        a: alpha[1],
                    };
                    blend(&mut dst, x, y, s, coverage(uv));
                });
            }
            Source::Solid(color) => {
                placement.for_each(|x, y, _, uv| blend(&mut dst, x, y, *color, coverage(uv)));
            }
            Source::Target(surface) => {
                let view = surface.view();
                let clamp = clamp_rect(source_rect, view.size());
                placement.for_each(|x, y, s, uv| {
                    let px = sample(&view, s, Filter::Linear, clamp);
                    blend(&mut dst, x, y, Sample::from_bgra(px), coverage(uv));
                });
            }
        }
    }
}
