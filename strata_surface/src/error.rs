// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer errors.

use strata_core::descriptor::BufferId;
use strata_core::geometry::IntSize;

use crate::pool::AccessState;

/// Failure to allocate, open or destroy a shared buffer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The pool could not provide the memory.
    #[error("cannot allocate {size:?} buffer: {reason}")]
    AllocationFailed {
        /// Requested size.
        size: IntSize,
        /// What went wrong.
        reason: &'static str,
    },
    /// The descriptor names no live segment.
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    /// The segment is open in a conflicting mode.
    #[error("buffer {id:?} is busy ({state:?})")]
    Busy {
        /// The segment.
        id: BufferId,
        /// Its current state.
        state: AccessState,
    },
    /// Write access was requested through a read-only mapping.
    #[error("buffer {0:?} was opened read-only")]
    ReadOnly(BufferId),
    /// The descriptor is not a shared-memory descriptor.
    #[error("descriptor is not a shared-memory buffer")]
    NotShmem,
    /// The descriptor's size or content type disagrees with the segment.
    #[error("descriptor for {0:?} does not match its allocation")]
    DescriptorMismatch(BufferId),
    /// Pixel data does not fit the declared layout.
    #[error("{len} bytes cannot hold {size:?} at stride {stride}")]
    BadLayout {
        /// Byte length supplied.
        len: usize,
        /// Declared size.
        size: IntSize,
        /// Declared row pitch.
        stride: usize,
    },
}
