// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor-side half of the strata transport.
//!
//! A [`CompositorSession`] receives [`Transaction`]s from one content
//! client, binds the descriptors they carry to per-layer hosts, answers with
//! [`EditReply`]s, and draws every layer through a [`Compositor`].
//!
//! ```text
//!   Transaction ──► CompositorSession::apply
//!                        │
//!                        ├─► ContentHost  (painted layers, double-buffered)
//!                        └─► ImageHost    (images, shared handles, YCbCr)
//!                                 │
//!                                 ▼
//!                           TextureHost ──► GpuContext textures
//!
//!   CompositorSession::composite ──► Compositor::draw_quad per visible quad
//! ```
//!
//! - [`GpuContext`] and [`GpuTexture`]: owner-thread texture storage.
//!   Dropping a [`GpuTexture`] off the owner thread posts the deletion back.
//! - [`Effect`] and [`EffectChain`]: what a quad samples and how it is
//!   masked.
//! - [`SoftwareContext`] and [`SoftwareCompositor`]: a CPU implementation
//!   that draws into an [`ImageSurface`](strata_surface::image::ImageSurface).
//! - [`TextureRecycleBin`]: per-purpose reuse of YCbCr plane textures.
//! - [`channel`]: an in-process byte transport between a content thread and
//!   a compositor thread.
//!
//! [`Transaction`]: strata_core::protocol::Transaction
//! [`EditReply`]: strata_core::protocol::EditReply
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Forwards session events to the trace sink.
//! - `trace-rich` (disabled by default, implies `trace`): Also forwards
//!   per-rect updated regions.

mod channel;
mod compositor;
mod content_host;
mod effect;
mod error;
mod gpu;
mod image_host;
mod recycle_bin;
mod session;
mod software;
mod texture_host;

pub use channel::{CompositorEndpoint, ContentEndpoint, channel};
pub use compositor::{Compositor, RenderTargetId};
pub use content_host::{ContentHost, SwapOutcome};
pub use effect::{Effect, EffectChain, EffectKind};
pub use error::{ChannelError, GpuError};
pub use gpu::{GpuContext, GpuTexture, TextureFormat, TextureId};
pub use image_host::{ImageHost, ImageUpdateOutcome};
pub use recycle_bin::{TexturePurpose, TextureRecycleBin};
pub use session::{CompositeStats, CompositorSession, SessionConfig};
pub use software::{MAX_TEXTURE_SIZE, SoftwareCompositor, SoftwareContext};
pub use texture_host::{TextureHost, TextureLock};
