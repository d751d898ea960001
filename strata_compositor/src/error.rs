// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use strata_core::codec::DecodeError;
use strata_core::descriptor::SharedHandle;
use strata_core::geometry::IntSize;
use strata_surface::SurfaceError;

use crate::compositor::RenderTargetId;
use crate::gpu::TextureId;

/// Failure of a GPU context operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GpuError {
    /// The texture could not be created.
    #[error("cannot create {size:?} texture: {reason}")]
    AllocationFailed {
        /// Requested size.
        size: IntSize,
        /// What went wrong.
        reason: &'static str,
    },
    /// The id names no live texture.
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    /// The id names no live render target.
    #[error("unknown render target {0:?}")]
    UnknownTarget(RenderTargetId),
    /// The shared handle cannot be imported.
    #[error("cannot import {0:?}")]
    UnknownHandle(SharedHandle),
    /// The context cannot do this at all.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// Source pixels could not be read.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Failure of the in-process transport.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The other end hung up.
    #[error("peer disconnected")]
    Disconnected,
    /// The peer sent bytes that do not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
