// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared-memory segment allocation and scoped access.
//!
//! A [`SurfacePool`] stands in for the shared-memory allocator both processes
//! can map. [`SurfacePool::alloc_buffer`] returns a plain
//! [`SurfaceDescriptor`]; touching the pixels requires
//! [`SurfacePool::open`], which moves the segment's [`AccessState`] and
//! returns an [`OpenSurface`] guard. Dropping the guard (or calling
//! [`OpenSurface::close`]) releases the mapping without destroying the
//! segment.
//!
//! ## Access states
//!
//! ```text
//!              open(ReadWrite)
//!   Unlocked ─────────────────▶ LockedForWrite
//!      ▲  │                          │
//!      │  │ open(ReadOnly)     close │
//!      │  ▼                          │
//!   LockedForRead(n) ◀── open(ReadOnly) (n + 1)
//!      │ close (n - 1, Unlocked at 0)
//! ```
//!
//! Opening a segment for write while any other open is outstanding is a
//! programming error: it is logged, asserted in debug builds, and reported as
//! [`SurfaceError::Busy`] in release builds.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_core::descriptor::{BufferId, ContentType, ShmemDescriptor, SurfaceDescriptor};
use strata_core::geometry::IntSize;

use crate::error::SurfaceError;
use crate::image::{ImageFormat, SurfaceMut, SurfaceRef};

/// Pool limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on the bytes held by live segments.
    pub max_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 << 20,
        }
    }
}

/// How a segment is mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Pixels may only be read.
    ReadOnly,
    /// Pixels may be read and written; excludes every other open.
    ReadWrite,
}

/// Ownership state of one segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessState {
    /// Nobody has the segment open.
    Unlocked,
    /// One writer has it open.
    LockedForWrite,
    /// This many readers have it open.
    LockedForRead(u32),
}

struct Segment {
    desc: ShmemDescriptor,
    state: Mutex<AccessState>,
    pixels: RwLock<Vec<u8>>,
}

impl Segment {
    fn format(&self) -> ImageFormat {
        ImageFormat::for_content(self.desc.content_type)
    }

    fn release(&self, mode: OpenMode) {
        let mut state = self.state.lock();
        *state = match (*state, mode) {
            (AccessState::LockedForRead(n), OpenMode::ReadOnly) if n > 1 => {
                AccessState::LockedForRead(n - 1)
            }
            (AccessState::LockedForRead(_), OpenMode::ReadOnly)
            | (AccessState::LockedForWrite, OpenMode::ReadWrite) => AccessState::Unlocked,
            (other, _) => {
                log::error!(
                    "release of {:?} in mode {mode:?} found state {other:?}",
                    self.desc.id
                );
                other
            }
        };
    }
}

#[derive(Default)]
struct PoolInner {
    segments: HashMap<BufferId, Arc<Segment>>,
    next_id: u64,
    bytes: usize,
    allocations: u64,
}

/// Allocator and registry for shared-memory pixel segments.
pub struct SurfacePool {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl core::fmt::Debug for SurfacePool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SurfacePool")
            .field("config", &self.config)
            .field("live", &inner.segments.len())
            .field("bytes", &inner.bytes)
            .finish_non_exhaustive()
    }
}

impl Default for SurfacePool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl SurfacePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Allocates a zero-filled segment.
    ///
    /// Fails without side effects when the size is empty or the pool would
    /// exceed [`PoolConfig::max_bytes`].
    pub fn alloc_buffer(
        &self,
        size: IntSize,
        content_type: ContentType,
    ) -> Result<SurfaceDescriptor, SurfaceError> {
        if size.is_empty() {
            return Err(SurfaceError::AllocationFailed {
                size,
                reason: "empty size",
            });
        }
        let mut inner = self.inner.lock();
        let mut desc = ShmemDescriptor {
            id: BufferId(0),
            size,
            content_type,
        };
        let len = desc.byte_len();
        if inner.bytes.saturating_add(len) > self.config.max_bytes {
            log::warn!(
                "pool exhausted: {len} bytes requested, {} of {} in use",
                inner.bytes,
                self.config.max_bytes
            );
            return Err(SurfaceError::AllocationFailed {
                size,
                reason: "pool exhausted",
            });
        }
        inner.next_id += 1;
        desc.id = BufferId(inner.next_id);
        inner.bytes += len;
        inner.allocations += 1;
        inner.segments.insert(
            desc.id,
            Arc::new(Segment {
                desc,
                state: Mutex::new(AccessState::Unlocked),
                pixels: RwLock::new(vec![0; len]),
            }),
        );
        log::trace!("allocated {:?} {size:?} {content_type:?}", desc.id);
        Ok(SurfaceDescriptor::Shmem(desc))
    }

    /// Destroys a segment. The segment must not be open.
    pub fn destroy_shared_surface(&self, desc: &SurfaceDescriptor) -> Result<(), SurfaceError> {
        let shmem = desc.as_shmem().ok_or(SurfaceError::NotShmem)?;
        let mut inner = self.inner.lock();
        let segment = inner
            .segments
            .get(&shmem.id)
            .ok_or(SurfaceError::UnknownBuffer(shmem.id))?;
        let state = *segment.state.lock();
        if state != AccessState::Unlocked {
            log::warn!("refusing to destroy {:?} while {state:?}", shmem.id);
            return Err(SurfaceError::Busy { id: shmem.id, state });
        }
        if let Some(segment) = inner.segments.remove(&shmem.id) {
            inner.bytes -= segment.desc.byte_len();
        }
        log::trace!("destroyed {:?}", shmem.id);
        Ok(())
    }

    /// Maps a segment.
    pub fn open(&self, mode: OpenMode, desc: &SurfaceDescriptor) -> Result<OpenSurface, SurfaceError> {
        let shmem = desc.as_shmem().ok_or(SurfaceError::NotShmem)?;
        let segment = self
            .inner
            .lock()
            .segments
            .get(&shmem.id)
            .cloned()
            .ok_or(SurfaceError::UnknownBuffer(shmem.id))?;
        if segment.desc != *shmem {
            return Err(SurfaceError::DescriptorMismatch(shmem.id));
        }
        {
            let mut state = segment.state.lock();
            let next = match (mode, *state) {
                (OpenMode::ReadWrite, AccessState::Unlocked) => Some(AccessState::LockedForWrite),
                (OpenMode::ReadOnly, AccessState::Unlocked) => Some(AccessState::LockedForRead(1)),
                (OpenMode::ReadOnly, AccessState::LockedForRead(n)) => {
                    Some(AccessState::LockedForRead(n + 1))
                }
                _ => None,
            };
            let Some(next) = next else {
                let current = *state;
                drop(state);
                if mode == OpenMode::ReadWrite {
                    log::error!("{:?} opened for write while {current:?}", shmem.id);
                } else {
                    log::warn!("{:?} opened for read while {current:?}", shmem.id);
                }
                debug_assert!(
                    mode == OpenMode::ReadOnly,
                    "{:?} opened for write while {current:?}",
                    shmem.id
                );
                return Err(SurfaceError::Busy {
                    id: shmem.id,
                    state: current,
                });
            };
            *state = next;
        }
        Ok(OpenSurface { segment, mode })
    }

    /// Current access state of a segment.
    #[must_use]
    pub fn state(&self, desc: &SurfaceDescriptor) -> Option<AccessState> {
        let shmem = desc.as_shmem()?;
        let inner = self.inner.lock();
        inner.segments.get(&shmem.id).map(|s| *s.state.lock())
    }

    /// Returns `true` if `desc` names a live segment.
    #[must_use]
    pub fn contains(&self, desc: &SurfaceDescriptor) -> bool {
        desc.as_shmem()
            .is_some_and(|d| self.inner.lock().segments.contains_key(&d.id))
    }

    /// Number of live segments.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.inner.lock().segments.len()
    }

    /// Bytes held by live segments.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().bytes
    }

    /// Segments allocated over the pool's lifetime.
    #[must_use]
    pub fn total_allocations(&self) -> u64 {
        self.inner.lock().allocations
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// A mapped segment. Releases its access state on drop.
pub struct OpenSurface {
    segment: Arc<Segment>,
    mode: OpenMode,
}

impl core::fmt::Debug for OpenSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpenSurface")
            .field("id", &self.segment.desc.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl OpenSurface {
    /// The mapped segment's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> SurfaceDescriptor {
        SurfaceDescriptor::Shmem(self.segment.desc)
    }

    /// Mapping mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Pixel dimensions.
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.segment.desc.size
    }

    /// Borrows the pixels for reading.
    #[must_use]
    pub fn pixels(&self) -> Pixels<'_> {
        Pixels {
            guard: self.segment.pixels.read(),
            desc: &self.segment.desc,
            format: self.segment.format(),
        }
    }

    /// Borrows the pixels for writing.
    pub fn pixels_mut(&self) -> Result<PixelsMut<'_>, SurfaceError> {
        if self.mode != OpenMode::ReadWrite {
            return Err(SurfaceError::ReadOnly(self.segment.desc.id));
        }
        Ok(PixelsMut {
            guard: self.segment.pixels.write(),
            desc: &self.segment.desc,
            format: self.segment.format(),
        })
    }

    /// Releases the mapping.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for OpenSurface {
    fn drop(&mut self) {
        self.segment.release(self.mode);
    }
}

/// Read access to a mapped segment's pixels.
pub struct Pixels<'a> {
    guard: RwLockReadGuard<'a, Vec<u8>>,
    desc: &'a ShmemDescriptor,
    format: ImageFormat,
}

impl core::fmt::Debug for Pixels<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pixels")
            .field("id", &self.desc.id)
            .finish_non_exhaustive()
    }
}

impl Pixels<'_> {
    /// A view of the segment.
    #[must_use]
    pub fn surface(&self) -> SurfaceRef<'_> {
        SurfaceRef::packed(&self.guard, self.desc.size, self.format)
    }
}

/// Write access to a mapped segment's pixels.
pub struct PixelsMut<'a> {
    guard: RwLockWriteGuard<'a, Vec<u8>>,
    desc: &'a ShmemDescriptor,
    format: ImageFormat,
}

impl core::fmt::Debug for PixelsMut<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelsMut")
            .field("id", &self.desc.id)
            .finish_non_exhaustive()
    }
}

impl PixelsMut<'_> {
    /// A read view of the segment.
    #[must_use]
    pub fn surface(&self) -> SurfaceRef<'_> {
        SurfaceRef::packed(&self.guard, self.desc.size, self.format)
    }

    /// A write view of the segment.
    #[must_use]
    pub fn surface_mut(&mut self) -> SurfaceMut<'_> {
        SurfaceMut::packed(&mut self.guard, self.desc.size, self.format)
    }
}

#[cfg(test)]
mod tests {
    use strata_core::geometry::IntRect;

    use super::*;

    fn pool() -> SurfacePool {
        SurfacePool::new(PoolConfig { max_bytes: 4096 })
    }

    #[test]
    fn guard_releases_on_drop() {
        let pool = pool();
        let desc = pool
            .alloc_buffer(IntSize::new(4, 4), ContentType::ColorAlpha)
            .unwrap();
        {
            let open = pool.open(OpenMode::ReadWrite, &desc).unwrap();
            assert_eq!(
                pool.state(&desc),
                Some(AccessState::LockedForWrite),
                "write lock held"
            );
            open.pixels_mut()
                .unwrap()
                .surface_mut()
                .fill_rect(IntRect::new(0, 0, 1, 1), [1, 2, 3, 4]);
        }
        assert_eq!(pool.state(&desc), Some(AccessState::Unlocked), "released");
        let open = pool.open(OpenMode::ReadOnly, &desc).unwrap();
        assert_eq!(
            open.pixels().surface().pixel(0, 0),
            [1, 2, 3, 4],
            "write persisted across mappings"
        );
    }

    #[test]
    fn readers_share() {
        let pool = pool();
        let desc = pool
            .alloc_buffer(IntSize::new(2, 2), ContentType::Alpha)
            .unwrap();
        let a = pool.open(OpenMode::ReadOnly, &desc).unwrap();
        let b = pool.open(OpenMode::ReadOnly, &desc).unwrap();
        assert_eq!(
            pool.state(&desc),
            Some(AccessState::LockedForRead(2)),
            "two readers"
        );
        a.close();
        assert_eq!(
            pool.state(&desc),
            Some(AccessState::LockedForRead(1)),
            "one reader left"
        );
        assert!(b.pixels_mut().is_err(), "read mapping cannot write");
        drop(b);
        assert_eq!(pool.state(&desc), Some(AccessState::Unlocked), "all closed");
    }

    #[test_log::test]
    #[cfg_attr(debug_assertions, should_panic(expected = "opened for write while"))]
    fn second_writer_fails_loudly() {
        let pool = pool();
        let desc = pool
            .alloc_buffer(IntSize::new(2, 2), ContentType::Alpha)
            .unwrap();
        let _first = pool.open(OpenMode::ReadWrite, &desc).unwrap();
        let second = pool.open(OpenMode::ReadWrite, &desc);
        assert!(
            matches!(second, Err(SurfaceError::Busy { .. })),
            "second writer refused"
        );
    }

    #[test_log::test]
    fn reader_blocked_by_writer() {
        let pool = pool();
        let desc = pool
            .alloc_buffer(IntSize::new(2, 2), ContentType::Alpha)
            .unwrap();
        let _w = pool.open(OpenMode::ReadWrite, &desc).unwrap();
        assert!(
            matches!(
                pool.open(OpenMode::ReadOnly, &desc),
                Err(SurfaceError::Busy {
                    state: AccessState::LockedForWrite,
                    ..
                })
            ),
            "reader refused while written"
        );
    }

    #[test_log::test]
    fn exhausted_pool_publishes_nothing() {
        let pool = pool();
        let err = pool
            .alloc_buffer(IntSize::new(64, 64), ContentType::ColorAlpha)
            .unwrap_err();
        assert!(
            matches!(err, SurfaceError::AllocationFailed { .. }),
            "allocation refused"
        );
        assert_eq!(pool.live_buffers(), 0, "no segment created");
        assert_eq!(pool.allocated_bytes(), 0, "no bytes accounted");
    }

    #[test_log::test]
    fn destroy_refuses_open_segment() {
        let pool = pool();
        let desc = pool
            .alloc_buffer(IntSize::new(2, 2), ContentType::Alpha)
            .unwrap();
        let open = pool.open(OpenMode::ReadOnly, &desc).unwrap();
        assert!(
            pool.destroy_shared_surface(&desc).is_err(),
            "open segment survives"
        );
        drop(open);
        pool.destroy_shared_surface(&desc).unwrap();
        assert!(!pool.contains(&desc), "segment gone");
        assert!(
            matches!(
                pool.open(OpenMode::ReadOnly, &desc),
                Err(SurfaceError::UnknownBuffer(_))
            ),
            "destroyed segment cannot be opened"
        );
    }

    #[test]
    fn mismatched_descriptor_is_rejected() {
        let pool = pool();
        let desc = pool
            .alloc_buffer(IntSize::new(2, 2), ContentType::Alpha)
            .unwrap();
        let SurfaceDescriptor::Shmem(mut forged) = desc else {
            unreachable!("pool hands out shmem descriptors");
        };
        forged.size = IntSize::new(4, 4);
        assert_eq!(
            pool.open(OpenMode::ReadOnly, &forged.into()).unwrap_err(),
            SurfaceError::DescriptorMismatch(forged.id),
            "size disagrees with allocation"
        );
    }
}
