// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire types and the layer-update protocol for cross-process texture
//! transport.
//!
//! `strata_core` holds everything both sides of the process boundary agree
//! on. It is `no_std` compatible (with `alloc`) and contains no pixel storage
//! of its own; buffers are referred to by descriptor only.
//!
//! # Architecture
//!
//! ```text
//!   content side                               compositor side
//!   ────────────                               ───────────────
//!   ContentClient / ImageClient
//!       │ paints into a TextureClient
//!       ▼
//!   Edit (PaintThebes, UpdateImage, ...)
//!       │ collected into a Transaction
//!       ▼
//!   codec::encode_transaction ──► bytes ──► codec::decode_transaction
//!                                                 │
//!                                                 ▼
//!                                   ContentHost / ImageHost bind descriptors
//!                                                 │
//!                                                 ▼
//!   codec::decode_replies ◄── bytes ◄── EditReply (SwapThebes, ReturnImage)
//! ```
//!
//! **[`geometry`]** and **[`region`]**: integer rectangles and regions in
//! layer space.
//!
//! **[`descriptor`]**: [`SurfaceDescriptor`](descriptor::SurfaceDescriptor),
//! [`SharedImage`](descriptor::SharedImage),
//! [`ThebesBuffer`](descriptor::ThebesBuffer) and the identifiers that name
//! which texture a message concerns. These are the only pixel-carrying types
//! that cross the process boundary.
//!
//! **[`layer`]**: generational [`LayerId`](layer::LayerId) handles and the
//! slot allocator that hands them out.
//!
//! **[`protocol`]**: [`Edit`](protocol::Edit),
//! [`EditReply`](protocol::EditReply) and
//! [`Transaction`](protocol::Transaction).
//!
//! **[`codec`]**: compact little-endian encoding of transactions and replies.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! transport instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-rect
//!   updated-region events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod codec;
pub mod descriptor;
pub mod geometry;
pub mod layer;
pub mod protocol;
pub mod region;
pub mod trace;
