// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer-update messages.
//!
//! The content side batches [`Edit`]s into a [`Transaction`]; the compositor
//! applies them in order and answers with [`EditReply`]s that hand buffer
//! ownership back. Edits for one layer keep their send order; nothing is
//! promised across layers.

use alloc::vec::Vec;

use kurbo::Affine;

use crate::descriptor::{CompositableKind, Filter, SharedImage, TextureIdentifier, ThebesBuffer};
use crate::geometry::IntRect;
use crate::layer::LayerId;
use crate::region::IntRegion;

/// Per-layer compositing attributes, carried beside the pixel payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerAttributes {
    /// Layer-to-target transform.
    pub transform: Affine,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Clip in target space, if any.
    pub clip: Option<IntRect>,
    /// Texture sampling filter.
    pub filter: Filter,
    /// Hidden layers are not composited.
    pub hidden: bool,
}

impl Default for LayerAttributes {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            opacity: 1.0,
            clip: None,
            filter: Filter::default(),
            hidden: false,
        }
    }
}

/// One change to one layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    /// A new layer exists.
    CreateLayer {
        /// The layer.
        layer: LayerId,
    },
    /// Binds (or replaces) the layer's compositable.
    Attach {
        /// The layer.
        layer: LayerId,
        /// Which host to create.
        kind: CompositableKind,
    },
    /// The layer's attributes changed.
    SetAttributes {
        /// The layer.
        layer: LayerId,
        /// New attributes.
        attributes: LayerAttributes,
    },
    /// A painted buffer is ready; the host takes ownership of it.
    PaintThebes {
        /// The layer.
        layer: LayerId,
        /// Which texture.
        identifier: TextureIdentifier,
        /// The freshly painted buffer.
        buffer: ThebesBuffer,
        /// Layer-space region that changed.
        updated_region: IntRegion,
        /// The layer's valid region after the paint.
        valid_region: IntRegion,
    },
    /// A new image is ready; the host takes ownership of it.
    UpdateImage {
        /// The layer.
        layer: LayerId,
        /// Which texture.
        identifier: TextureIdentifier,
        /// The payload.
        image: SharedImage,
    },
    /// The visible window of a YCbCr image changed.
    UpdatePictureRect {
        /// The layer.
        layer: LayerId,
        /// New picture rect.
        rect: IntRect,
    },
    /// The layer is gone; later edits naming it are ignored.
    DestroyLayer {
        /// The layer.
        layer: LayerId,
    },
}

impl Edit {
    /// The layer this edit concerns.
    #[must_use]
    pub const fn layer(&self) -> LayerId {
        match self {
            Self::CreateLayer { layer }
            | Self::Attach { layer, .. }
            | Self::SetAttributes { layer, .. }
            | Self::PaintThebes { layer, .. }
            | Self::UpdateImage { layer, .. }
            | Self::UpdatePictureRect { layer, .. }
            | Self::DestroyLayer { layer } => *layer,
        }
    }

    /// Short name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateLayer { .. } => "CreateLayer",
            Self::Attach { .. } => "Attach",
            Self::SetAttributes { .. } => "SetAttributes",
            Self::PaintThebes { .. } => "PaintThebes",
            Self::UpdateImage { .. } => "UpdateImage",
            Self::UpdatePictureRect { .. } => "UpdatePictureRect",
            Self::DestroyLayer { .. } => "DestroyLayer",
        }
    }
}

/// The compositor's answer to a [`Edit::PaintThebes`].
#[derive(Clone, Debug, PartialEq)]
pub struct ThebesSwap {
    /// The layer.
    pub layer: LayerId,
    /// Which texture.
    pub identifier: TextureIdentifier,
    /// Buffer the client may paint into next, if any.
    pub new_back: Option<ThebesBuffer>,
    /// Region of `new_back` holding valid content.
    pub new_back_valid_region: IntRegion,
    /// The host's new front, readable by the client until its next swap.
    pub read_only_front: Option<ThebesBuffer>,
    /// Region of the read-only front that differs from `new_back`.
    pub front_updated_region: IntRegion,
}

/// A message from the compositor back to the content side.
#[derive(Clone, Debug, PartialEq)]
pub enum EditReply {
    /// Outcome of a painted-buffer update.
    SwapThebes(ThebesSwap),
    /// A buffer the host no longer needs; ownership returns to the client.
    ReturnImage {
        /// The layer.
        layer: LayerId,
        /// Which texture.
        identifier: TextureIdentifier,
        /// The returned payload.
        image: SharedImage,
    },
}

impl EditReply {
    /// The layer this reply concerns.
    #[must_use]
    pub const fn layer(&self) -> LayerId {
        match self {
            Self::SwapThebes(swap) => swap.layer,
            Self::ReturnImage { layer, .. } => *layer,
        }
    }
}

/// An ordered batch of edits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    /// Edits in application order.
    pub edits: Vec<Edit>,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an edit.
    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Returns `true` if there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
