// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-side half of the strata transport.
//!
//! Everything here runs on the content thread. Buffers are allocated from a
//! shared [`SurfacePool`](strata_surface::pool::SurfacePool), painted under a
//! scoped lock, and then *sent*: the descriptor leaves the client inside an
//! [`Edit`](strata_core::protocol::Edit) and only comes back through an
//! [`EditReply`](strata_core::protocol::EditReply).
//!
//! - [`LayerForwarder`] allocates layer ids and batches edits into a
//!   transaction.
//! - [`TextureClient`] owns one descriptor and hands out write locks.
//! - [`ContentClient`] runs the double-buffered paint protocol for painted
//!   layers.
//! - [`ImageClient`] publishes still images, shared GPU handles, and planar
//!   YCbCr frames.
//! - [`CanvasClient`] publishes canvas output.

mod canvas;
mod content;
mod error;
mod forwarder;
mod image;
mod texture_client;

pub use canvas::{CanvasClient, CanvasSource};
pub use content::{ContentClient, ContentPolicy, ContentState, PaintFlags, PaintState, PaintTarget};
pub use error::ClientError;
pub use forwarder::LayerForwarder;
pub use image::{Image, ImageClient, ImageContainer, ImageUpdate, PlanarYCbCrData, image_content_type};
pub use texture_client::{TextureClient, TextureClientLock};
