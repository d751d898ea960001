// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use strata_core::layer::LayerId;
use strata_surface::SurfaceError;

/// Content-side failure. Aborts the current paint or update; the next frame
/// retries.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Allocating, opening or destroying a buffer failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// The previous paint has not been answered by the compositor yet.
    #[error("previous buffer swap has not completed")]
    SwapPending,
    /// The bound descriptor cannot be mapped for CPU writes.
    #[error("descriptor cannot be locked for CPU access")]
    NotLockable,
    /// No buffer is bound.
    #[error("no buffer is bound")]
    NoBuffer,
    /// The layer was destroyed; the edit was not queued.
    #[error("{0:?} no longer exists")]
    LayerGone(LayerId),
}
