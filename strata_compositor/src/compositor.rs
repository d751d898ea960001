// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositing primitive.

use std::sync::Arc;

use kurbo::{Affine, Rect, Vec2};
use strata_core::geometry::{IntPoint, IntRect};

use crate::effect::EffectChain;
use crate::error::GpuError;
use crate::gpu::GpuContext;

/// Identifier of an offscreen render target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u32);

impl core::fmt::Debug for RenderTargetId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RenderTargetId({})", self.0)
    }
}

/// Draws quads into a stack of render targets.
///
/// With no target set, drawing goes to the compositor's own frame.
pub trait Compositor {
    /// The context textures for this compositor come from.
    fn context(&self) -> Arc<dyn GpuContext>;

    /// Starts a new frame: clears it and directs drawing back to it.
    fn begin_frame(&mut self);

    /// Creates a transparent offscreen target covering `rect` in frame
    /// space.
    fn create_surface(&mut self, rect: IntRect) -> Result<RenderTargetId, GpuError>;

    /// Creates a target covering `rect`, initialized from `source` starting
    /// at `source_point` (in `source`'s own space).
    fn create_surface_from_surface(
        &mut self,
        rect: IntRect,
        source: RenderTargetId,
        source_point: IntPoint,
    ) -> Result<RenderTargetId, GpuError>;

    /// Directs drawing to `target`, or back to the frame with `None`.
    fn set_surface_target(&mut self, target: Option<RenderTargetId>);

    /// The target drawing currently goes to.
    fn surface_target(&self) -> Option<RenderTargetId>;

    /// Frees an offscreen target. Drawing falls back to the frame if it was
    /// current.
    fn destroy_surface(&mut self, target: RenderTargetId);

    /// Draws the chain's primary effect over `rect`.
    ///
    /// `source_rect` is the area of the effect's textures sampled across
    /// `rect` (the whole texture if `None`). `rect` is mapped to the current
    /// target by `offset` after `transform`, then clipped to `clip` (target
    /// space). Coverage is scaled by `opacity` and blended source-over.
    fn draw_quad(
        &mut self,
        rect: Rect,
        source_rect: Option<Rect>,
        clip: Option<IntRect>,
        effects: &EffectChain,
        opacity: f32,
        transform: Affine,
        offset: Vec2,
    );
}
