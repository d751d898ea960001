// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositing inputs.
//!
//! An [`Effect`] is one input to a quad: a texture to sample, a color, a mask.
//! An [`EffectChain`] holds at most one effect of each [`EffectKind`] in a
//! fixed array indexed by kind, so inserting a second effect of a kind
//! replaces the first.

use kurbo::Affine;
use strata_core::descriptor::Filter;

use crate::compositor::RenderTargetId;
use crate::gpu::TextureId;

/// Effect discriminant, used as the chain index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EffectKind {
    /// Opaque BGR texture.
    Bgrx = 0,
    /// Premultiplied BGRA texture.
    Bgra = 1,
    /// Three-plane YCbCr.
    YCbCr = 2,
    /// Subpixel text rendered on black and on white.
    ComponentAlpha = 3,
    /// A flat color.
    SolidColor = 4,
    /// An offscreen render target.
    RenderTarget = 5,
    /// Alpha mask applied on top of the primary effect.
    Mask = 6,
}

impl EffectKind {
    /// Number of kinds, and so the chain length.
    pub const COUNT: usize = 7;

    /// All kinds in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Bgrx,
        Self::Bgra,
        Self::YCbCr,
        Self::ComponentAlpha,
        Self::SolidColor,
        Self::RenderTarget,
        Self::Mask,
    ];

    /// Position in an [`EffectChain`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One compositing input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// Samples an opaque texture.
    Bgrx {
        /// The texture.
        texture: TextureId,
        /// Sampling filter.
        filter: Filter,
        /// Rows are stored bottom-up.
        flipped: bool,
    },
    /// Samples a premultiplied texture.
    Bgra {
        /// The texture.
        texture: TextureId,
        /// Sampling filter.
        filter: Filter,
        /// Rows are stored bottom-up.
        flipped: bool,
    },
    /// Converts three single-channel planes to color.
    ///
    /// The source rect is in luma texels; chroma is scaled to fit.
    YCbCr {
        /// Luma plane.
        y: TextureId,
        /// Blue-difference plane.
        cb: TextureId,
        /// Red-difference plane.
        cr: TextureId,
        /// Sampling filter.
        filter: Filter,
    },
    /// Per-channel alpha from a black and a white rendering.
    ComponentAlpha {
        /// Content rendered over opaque black.
        on_black: TextureId,
        /// Content rendered over opaque white.
        on_white: TextureId,
        /// Sampling filter.
        filter: Filter,
    },
    /// A flat, unpremultiplied RGBA color.
    SolidColor {
        /// Red, green, blue, alpha in `[0, 1]`.
        color: [f32; 4],
    },
    /// Samples an offscreen target.
    RenderTarget {
        /// The target.
        target: RenderTargetId,
    },
    /// Multiplies coverage by a texture's alpha.
    Mask {
        /// Mask texture.
        texture: TextureId,
        /// Maps quad-local unit coordinates to mask texels.
        transform: Affine,
    },
}

impl Effect {
    /// The slot this effect occupies in a chain.
    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::Bgrx { .. } => EffectKind::Bgrx,
            Self::Bgra { .. } => EffectKind::Bgra,
            Self::YCbCr { .. } => EffectKind::YCbCr,
            Self::ComponentAlpha { .. } => EffectKind::ComponentAlpha,
            Self::SolidColor { .. } => EffectKind::SolidColor,
            Self::RenderTarget { .. } => EffectKind::RenderTarget,
            Self::Mask { .. } => EffectKind::Mask,
        }
    }
}

/// The effects for one quad, at most one per kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectChain {
    effects: [Option<Effect>; EffectKind::COUNT],
}

impl EffectChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `effect` in its kind's slot, returning what was there.
    pub fn insert(&mut self, effect: Effect) -> Option<Effect> {
        self.effects[effect.kind().index()].replace(effect)
    }

    /// Removes the effect of `kind`.
    pub fn remove(&mut self, kind: EffectKind) -> Option<Effect> {
        self.effects[kind.index()].take()
    }

    /// The effect of `kind`.
    #[must_use]
    pub fn get(&self, kind: EffectKind) -> Option<&Effect> {
        self.effects[kind.index()].as_ref()
    }

    /// The effect that provides color: the first occupied non-mask slot.
    #[must_use]
    pub fn primary(&self) -> Option<&Effect> {
        self.effects[..EffectKind::Mask.index()]
            .iter()
            .find_map(Option::as_ref)
    }

    /// The mask, if any.
    #[must_use]
    pub fn mask(&self) -> Option<&Effect> {
        self.get(EffectKind::Mask)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.iter().filter(|e| e.is_some()).count()
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        self.effects = [None; EffectKind::COUNT];
    }
}
