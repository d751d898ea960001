// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU-shareable texture handles.
//!
//! A [`SharedHandleTable`] plays the role of the driver's handle namespace: a
//! producer creates a handle, renders into the surface behind it, and sends
//! the [`SharedTextureDescriptor`] across. The consumer imports the surface by
//! handle. Handles belong to the producer's context, so
//! [`SharedHandleTable::release`] always runs on that context's owner thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use strata_core::descriptor::{ShareType, SharedHandle, SharedTextureDescriptor};
use strata_core::geometry::IntSize;

use crate::error::SurfaceError;
use crate::handoff::{Dispatch, OwnerGone, OwnerHandle};
use crate::image::{ImageFormat, ImageSurface};

/// Pixels behind a shared handle.
pub type SharedSurface = Arc<RwLock<ImageSurface>>;

type Handles = Arc<Mutex<HashMap<SharedHandle, SharedSurface>>>;

/// Namespace of live shared handles for one producing context.
pub struct SharedHandleTable {
    handles: Handles,
    next: AtomicU64,
    owner: OwnerHandle,
}

impl core::fmt::Debug for SharedHandleTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedHandleTable")
            .field("live", &self.handles.lock().len())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl SharedHandleTable {
    /// Creates an empty table whose handles are released on `owner`'s thread.
    #[must_use]
    pub fn new(owner: OwnerHandle) -> Self {
        Self {
            handles: Arc::default(),
            next: AtomicU64::new(1),
            owner,
        }
    }

    /// Creates a transparent BGRA surface and a handle to it.
    pub fn create(
        &self,
        size: IntSize,
        share_type: ShareType,
        inverted: bool,
    ) -> Result<SharedTextureDescriptor, SurfaceError> {
        if size.is_empty() {
            return Err(SurfaceError::AllocationFailed {
                size,
                reason: "empty size",
            });
        }
        let handle = SharedHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.handles.lock().insert(
            handle,
            Arc::new(RwLock::new(ImageSurface::new(size, ImageFormat::Bgra32))),
        );
        log::trace!("created {handle:?} {size:?}");
        Ok(SharedTextureDescriptor {
            share_type,
            handle,
            size,
            inverted,
        })
    }

    /// The surface behind `handle`, if it is live.
    #[must_use]
    pub fn surface(&self, handle: SharedHandle) -> Option<SharedSurface> {
        self.handles.lock().get(&handle).cloned()
    }

    /// Returns `true` if `handle` is live.
    #[must_use]
    pub fn contains(&self, handle: SharedHandle) -> bool {
        self.handles.lock().contains_key(&handle)
    }

    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns `true` if no handle is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases a handle on the owner thread, in place if already there.
    pub fn release(&self, desc: &SharedTextureDescriptor) -> Result<Dispatch, OwnerGone> {
        let handles = Arc::clone(&self.handles);
        let handle = desc.handle;
        self.owner.run_or_post(Box::new(move || {
            if handles.lock().remove(&handle).is_none() {
                log::warn!("released unknown {handle:?}");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::handoff::TaskQueue;

    #[test]
    fn create_and_release_inline() {
        let queue = TaskQueue::for_current_thread();
        let table = SharedHandleTable::new(queue.handle());
        let desc = table
            .create(IntSize::new(8, 8), ShareType::SameProcess, false)
            .unwrap();
        assert!(table.surface(desc.handle).is_some(), "handle resolves");
        assert_eq!(
            table.release(&desc),
            Ok(Dispatch::Inline),
            "owner releases in place"
        );
        assert!(table.is_empty(), "handle gone");
    }

    #[test]
    fn foreign_release_waits_for_owner() {
        let queue = TaskQueue::for_current_thread();
        let table = Arc::new(SharedHandleTable::new(queue.handle()));
        let desc = table
            .create(IntSize::new(4, 4), ShareType::CrossProcess, true)
            .unwrap();
        let t = Arc::clone(&table);
        let d = thread::spawn(move || t.release(&desc)).join().unwrap();
        assert_eq!(d, Ok(Dispatch::Deferred), "queued for the owner");
        assert!(table.contains(desc.handle), "still live until drained");
        queue.run_pending();
        assert!(!table.contains(desc.handle), "released on the owner thread");
    }

    #[test]
    fn empty_size_is_refused() {
        let queue = TaskQueue::for_current_thread();
        let table = SharedHandleTable::new(queue.handle());
        assert!(
            table
                .create(IntSize::ZERO, ShareType::SameProcess, false)
                .is_err(),
            "nothing to share"
        );
    }
}
