// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared pixel buffers and the rules for touching them.
//!
//! - [`pool::SurfacePool`] allocates shared-memory segments, hands out
//!   [`SurfaceDescriptor`](strata_core::descriptor::SurfaceDescriptor)s, and
//!   opens them into scoped [`pool::OpenSurface`] guards. Each segment carries
//!   an ownership state machine (unlocked, locked for write, locked for read);
//!   guards acquire on construction and release on drop.
//! - [`image`] holds CPU pixel surfaces and the copy/fill primitives the
//!   clients and the software compositor share.
//! - [`rotated`] maps layer-space regions onto rotated buffers.
//! - [`handoff`] binds work to the thread that owns a GPU context and queues
//!   it there from anywhere else.
//! - [`shared_handle`] emulates GPU-shareable texture handles.

pub mod error;
pub mod handoff;
pub mod image;
pub mod pool;
pub mod rotated;
pub mod shared_handle;

pub use error::SurfaceError;
