// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::marker::PhantomData;
use std::sync::Arc;

use strata_core::descriptor::{ContentType, SurfaceDescriptor, TextureIdentifier};
use strata_core::geometry::IntSize;
use strata_core::layer::LayerId;
use strata_surface::pool::{OpenMode, OpenSurface, PixelsMut, SurfacePool};

use crate::error::ClientError;

/// Content-side owner of one buffer.
///
/// A client owns its descriptor until it is taken for sending. Owned
/// shared-memory descriptors are destroyed when replaced or when the client
/// is dropped.
pub struct TextureClient {
    pool: Arc<SurfacePool>,
    layer: LayerId,
    identifier: TextureIdentifier,
    descriptor: Option<SurfaceDescriptor>,
}

impl core::fmt::Debug for TextureClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextureClient")
            .field("layer", &self.layer)
            .field("identifier", &self.identifier)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl TextureClient {
    /// Creates a client with no buffer.
    #[must_use]
    pub fn new(pool: Arc<SurfacePool>, layer: LayerId, identifier: TextureIdentifier) -> Self {
        Self {
            pool,
            layer,
            identifier,
            descriptor: None,
        }
    }

    /// The layer this client paints for.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Which logical texture this client feeds.
    #[must_use]
    pub fn identifier(&self) -> TextureIdentifier {
        self.identifier
    }

    /// The pool buffers come from.
    #[must_use]
    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    /// The bound descriptor.
    #[must_use]
    pub fn descriptor(&self) -> Option<&SurfaceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Size of the bound buffer.
    #[must_use]
    pub fn size(&self) -> Option<IntSize> {
        self.descriptor.as_ref().map(SurfaceDescriptor::size)
    }

    /// Makes sure a buffer of `size` and `content_type` is bound.
    ///
    /// Returns `true` if a new buffer was allocated. Calling again with the
    /// same parameters allocates nothing. On failure no buffer is bound.
    pub fn ensure_allocated(
        &mut self,
        size: IntSize,
        content_type: ContentType,
    ) -> Result<bool, ClientError> {
        if let Some(desc) = &self.descriptor
            && desc.size() == size
            && desc.content_type() == content_type
        {
            return Ok(false);
        }
        self.release();
        let desc = self.pool.alloc_buffer(size, content_type)?;
        log::debug!(
            "{:?} {:?}: allocated {size:?} {content_type:?}",
            self.layer,
            self.identifier
        );
        self.descriptor = Some(desc);
        Ok(true)
    }

    /// Binds a descriptor received from the compositor, destroying a
    /// different one this client still owns.
    pub fn set_descriptor(&mut self, descriptor: Option<SurfaceDescriptor>) {
        if self.descriptor != descriptor {
            self.release();
        }
        self.descriptor = descriptor;
    }

    /// Unbinds the descriptor without destroying it, transferring ownership
    /// to the caller (normally to be sent).
    pub fn take_descriptor(&mut self) -> Option<SurfaceDescriptor> {
        self.descriptor.take()
    }

    /// Opens the bound buffer for writing.
    ///
    /// The lock borrows the client mutably, so only one can be outstanding.
    /// It unlocks when dropped, on every exit path.
    pub fn lock(&mut self) -> Result<TextureClientLock<'_>, ClientError> {
        let desc = self.descriptor.as_ref().ok_or(ClientError::NoBuffer)?;
        if !matches!(desc, SurfaceDescriptor::Shmem(_)) {
            return Err(ClientError::NotLockable);
        }
        let open = self.pool.open(OpenMode::ReadWrite, desc)?;
        Ok(TextureClientLock {
            open,
            _client: PhantomData,
        })
    }

    fn release(&mut self) {
        let Some(desc) = self.descriptor.take() else {
            return;
        };
        if matches!(desc, SurfaceDescriptor::Shmem(_))
            && let Err(e) = self.pool.destroy_shared_surface(&desc)
        {
            log::warn!("{:?}: could not destroy {desc:?}: {e}", self.layer);
        }
    }
}

impl Drop for TextureClient {
    fn drop(&mut self) {
        self.release();
    }
}

/// Write access to a [`TextureClient`]'s buffer.
pub struct TextureClientLock<'a> {
    open: OpenSurface,
    _client: PhantomData<&'a mut TextureClient>,
}

impl core::fmt::Debug for TextureClientLock<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextureClientLock")
            .field("open", &self.open)
            .finish()
    }
}

impl TextureClientLock<'_> {
    /// The locked buffer's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> SurfaceDescriptor {
        self.open.descriptor()
    }

    /// Pixel dimensions.
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.open.size()
    }

    /// The drawing target.
    pub fn pixels(&self) -> Result<PixelsMut<'_>, ClientError> {
        Ok(self.open.pixels_mut()?)
    }

    /// Releases the lock.
    pub fn unlock(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use strata_core::descriptor::{
        CompositableKind, ShareType, SharedHandle, SharedTextureDescriptor, TextureKind,
    };
    use strata_core::geometry::IntRect;
    use strata_surface::pool::{AccessState, PoolConfig};

    use super::*;

    fn client(pool: &Arc<SurfacePool>) -> TextureClient {
        TextureClient::new(
            Arc::clone(pool),
            LayerId::from_raw(0, 0),
            TextureIdentifier::new(CompositableKind::ImageTexture, TextureKind::Shmem),
        )
    }

    #[test]
    fn ensure_is_idempotent() {
        let pool = Arc::new(SurfacePool::default());
        let mut c = client(&pool);
        let size = IntSize::new(16, 16);
        assert!(
            c.ensure_allocated(size, ContentType::ColorAlpha).unwrap(),
            "first call allocates"
        );
        assert!(
            !c.ensure_allocated(size, ContentType::ColorAlpha).unwrap(),
            "second call reuses"
        );
        assert_eq!(pool.total_allocations(), 1, "one allocation in total");
    }

    #[test]
    fn resize_destroys_previous_buffer() {
        let pool = Arc::new(SurfacePool::default());
        let mut c = client(&pool);
        c.ensure_allocated(IntSize::new(8, 8), ContentType::Color)
            .unwrap();
        let first = *c.descriptor().unwrap();
        c.ensure_allocated(IntSize::new(8, 8), ContentType::Alpha)
            .unwrap();
        assert!(!pool.contains(&first), "old buffer destroyed");
        assert_eq!(pool.live_buffers(), 1, "only the new buffer is live");
    }

    #[test]
    fn lock_is_released_on_every_path() {
        let pool = Arc::new(SurfacePool::default());
        let mut c = client(&pool);
        c.ensure_allocated(IntSize::new(4, 4), ContentType::ColorAlpha)
            .unwrap();
        let desc = *c.descriptor().unwrap();
        let paint = |c: &mut TextureClient| -> Result<(), ClientError> {
            let lock = c.lock()?;
            lock.pixels()?
                .surface_mut()
                .fill_rect(IntRect::new(0, 0, 2, 2), [1, 1, 1, 1]);
            Err(ClientError::NoBuffer)
        };
        assert!(paint(&mut c).is_err(), "painter bailed out");
        assert_eq!(
            pool.state(&desc),
            Some(AccessState::Unlocked),
            "early return still unlocked"
        );
        let lock = c.lock().unwrap();
        assert_eq!(
            pool.state(&desc),
            Some(AccessState::LockedForWrite),
            "relocked"
        );
        lock.unlock();
        assert_eq!(pool.state(&desc), Some(AccessState::Unlocked), "unlocked");
    }

    #[test]
    fn taken_descriptor_survives_drop() {
        let pool = Arc::new(SurfacePool::default());
        let mut c = client(&pool);
        c.ensure_allocated(IntSize::new(4, 4), ContentType::Alpha)
            .unwrap();
        let sent = c.take_descriptor().unwrap();
        drop(c);
        assert!(pool.contains(&sent), "ownership moved with the descriptor");
    }

    #[test]
    fn dropped_client_destroys_its_buffer() {
        let pool = Arc::new(SurfacePool::default());
        let mut c = client(&pool);
        c.ensure_allocated(IntSize::new(4, 4), ContentType::Alpha)
            .unwrap();
        drop(c);
        assert_eq!(pool.live_buffers(), 0, "nothing leaked");
    }

    #[test]
    fn shared_descriptor_is_not_lockable() {
        let pool = Arc::new(SurfacePool::default());
        let mut c = client(&pool);
        c.set_descriptor(Some(SurfaceDescriptor::SharedTexture(
            SharedTextureDescriptor {
                share_type: ShareType::SameProcess,
                handle: SharedHandle(1),
                size: IntSize::new(2, 2),
                inverted: false,
            },
        )));
        assert_eq!(
            c.lock().unwrap_err(),
            ClientError::NotLockable,
            "gpu handles have no cpu mapping"
        );
    }

    #[test_log::test]
    fn failed_allocation_leaves_nothing_bound() {
        let pool = Arc::new(SurfacePool::new(PoolConfig { max_bytes: 64 }));
        let mut c = client(&pool);
        c.ensure_allocated(IntSize::new(2, 2), ContentType::ColorAlpha)
            .unwrap();
        assert!(
            c.ensure_allocated(IntSize::new(32, 32), ContentType::ColorAlpha)
                .is_err(),
            "pool too small"
        );
        assert!(c.descriptor().is_none(), "no half-initialized buffer");
    }
}
