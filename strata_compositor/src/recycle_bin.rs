// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reuse of YCbCr plane textures across frames.
//!
//! Video frames arrive at a steady size, so the planes released by one frame
//! are exactly what the next needs. The bin keeps one stack per
//! [`TexturePurpose`]. A stack only ever holds textures of a single size:
//! recycling a texture of a different size flushes the stack first, and a
//! request for a size the stack does not hold allocates fresh.

use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::geometry::IntSize;

use crate::error::GpuError;
use crate::gpu::{GpuContext, GpuTexture, TextureFormat};

/// Which plane a recycled texture served.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexturePurpose {
    /// Luma.
    Y,
    /// Either chroma plane.
    C,
}

impl TexturePurpose {
    const fn index(self) -> usize {
        match self {
            Self::Y => 0,
            Self::C => 1,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    size: IntSize,
    textures: Vec<GpuTexture>,
}

/// Per-purpose stacks of same-sized textures.
#[derive(Debug)]
pub struct TextureRecycleBin {
    slots: Mutex<[Slot; 2]>,
    max_per_purpose: usize,
}

impl TextureRecycleBin {
    /// Creates a bin holding at most `max_per_purpose` textures per stack.
    #[must_use]
    pub fn new(max_per_purpose: usize) -> Self {
        Self {
            slots: Mutex::new([Slot::default(), Slot::default()]),
            max_per_purpose,
        }
    }

    /// Returns a cached texture of `size`, or creates one in `context`.
    pub fn get_texture(
        &self,
        purpose: TexturePurpose,
        size: IntSize,
        context: &Arc<dyn GpuContext>,
        format: TextureFormat,
    ) -> Result<GpuTexture, GpuError> {
        let cached = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[purpose.index()];
            if slot.size == size { slot.textures.pop() } else { None }
        };
        match cached {
            Some(texture) if texture.format() == format => {
                log::trace!("reusing {:?} for {purpose:?}", texture.id());
                Ok(texture)
            }
            _ => GpuTexture::new(context, size, format),
        }
    }

    /// Returns `texture` to the `purpose` stack.
    ///
    /// A size change empties the stack before the texture is added.
    pub fn recycle_texture(&self, texture: GpuTexture, purpose: TexturePurpose, size: IntSize) {
        let flushed = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[purpose.index()];
            let flushed = if !slot.textures.is_empty() && slot.size != size {
                core::mem::take(&mut slot.textures)
            } else {
                Vec::new()
            };
            slot.size = size;
            if slot.textures.len() < self.max_per_purpose {
                slot.textures.push(texture);
            }
            flushed
        };
        // Deletion posts to the owner queue; keep it outside the lock.
        drop(flushed);
    }

    /// Number of cached textures for `purpose`.
    #[must_use]
    pub fn len(&self, purpose: TexturePurpose) -> usize {
        self.slots.lock()[purpose.index()].textures.len()
    }

    /// Returns `true` if nothing is cached for any purpose.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().iter().all(|s| s.textures.is_empty())
    }

    /// The size the `purpose` stack currently holds.
    #[must_use]
    pub fn cached_size(&self, purpose: TexturePurpose) -> IntSize {
        self.slots.lock()[purpose.index()].size
    }

    /// Drops every cached texture.
    pub fn clear(&self) {
        let flushed: Vec<_> = {
            let mut slots = self.slots.lock();
            slots
                .iter_mut()
                .flat_map(|s| core::mem::take(&mut s.textures))
                .collect()
        };
        drop(flushed);
    }
}

#[cfg(test)]
mod tests {
    use strata_surface::handoff::TaskQueue;

    use super::*;
    use crate::software::SoftwareContext;

    fn context() -> (TaskQueue, Arc<SoftwareContext>, Arc<dyn GpuContext>) {
        let queue = TaskQueue::for_current_thread();
        let soft = Arc::new(SoftwareContext::new(queue.handle()));
        let dynamic: Arc<dyn GpuContext> = Arc::clone(&soft) as Arc<dyn GpuContext>;
        (queue, soft, dynamic)
    }

    #[test]
    fn same_size_is_reused() {
        let (_q, soft, ctx) = context();
        let bin = TextureRecycleBin::new(4);
        let size = IntSize::new(16, 8);
        let t = bin
            .get_texture(TexturePurpose::Y, size, &ctx, TextureFormat::R8)
            .unwrap();
        let id = t.id();
        bin.recycle_texture(t, TexturePurpose::Y, size);
        assert_eq!(bin.len(TexturePurpose::Y), 1, "cached");
        let again = bin
            .get_texture(TexturePurpose::Y, size, &ctx, TextureFormat::R8)
            .unwrap();
        assert_eq!(again.id(), id, "popped from the stack");
        assert_eq!(soft.live_textures(), 1, "no second allocation");
    }

    #[test]
    fn size_change_flushes_the_stack() {
        let (_q, soft, ctx) = context();
        let bin = TextureRecycleBin::new(4);
        let small = IntSize::new(8, 8);
        let large = IntSize::new(16, 16);
        for _ in 0..2 {
            let t = GpuTexture::new(&ctx, small, TextureFormat::R8).unwrap();
            bin.recycle_texture(t, TexturePurpose::C, small);
        }
        assert_eq!(bin.len(TexturePurpose::C), 2, "two small planes cached");

        let t = GpuTexture::new(&ctx, large, TextureFormat::R8).unwrap();
        bin.recycle_texture(t, TexturePurpose::C, large);
        assert_eq!(bin.len(TexturePurpose::C), 1, "small planes flushed");
        assert_eq!(bin.cached_size(TexturePurpose::C), large, "stack resized");
        assert_eq!(soft.live_textures(), 1, "flushed textures deleted");

        let fresh = bin
            .get_texture(TexturePurpose::C, small, &ctx, TextureFormat::R8)
            .unwrap();
        assert_eq!(fresh.size(), small, "mismatched size allocates");
        assert_eq!(bin.len(TexturePurpose::C), 1, "large plane untouched");
    }

    #[test]
    fn purposes_are_independent_and_bounded() {
        let (_q, soft, ctx) = context();
        let bin = TextureRecycleBin::new(1);
        let size = IntSize::new(4, 4);
        for purpose in [TexturePurpose::Y, TexturePurpose::Y, TexturePurpose::C] {
            let t = GpuTexture::new(&ctx, size, TextureFormat::R8).unwrap();
            bin.recycle_texture(t, purpose, size);
        }
        assert_eq!(bin.len(TexturePurpose::Y), 1, "capped at one");
        assert_eq!(bin.len(TexturePurpose::C), 1, "separate stack");
        bin.clear();
        assert!(bin.is_empty(), "cleared");
        assert_eq!(soft.live_textures(), 0, "everything deleted");
    }

    #[test]
    fn shared_between_threads() {
        const THREADS: usize = 4;
        const ROUNDS: usize = 50;
        let (queue, soft, ctx) = context();
        let bin = TextureRecycleBin::new(THREADS);
        let sizes = [IntSize::new(8, 8), IntSize::new(16, 16)];
        std::thread::scope(|scope| {
            for worker in 0..THREADS {
                let (bin, ctx) = (&bin, &ctx);
                scope.spawn(move || {
                    for round in 0..ROUNDS {
                        let size = sizes[(worker + round / 10) % sizes.len()];
                        let t = bin
                            .get_texture(TexturePurpose::Y, size, ctx, TextureFormat::R8)
                            .unwrap();
                        assert_eq!(t.size(), size, "texture matches the request");
                        bin.recycle_texture(t, TexturePurpose::Y, size);
                    }
                });
            }
        });
        queue.run_pending();
        assert!(bin.len(TexturePurpose::Y) <= THREADS, "stack stays bounded");
        assert_eq!(
            soft.live_textures(),
            bin.len(TexturePurpose::Y),
            "every texture is cached or deleted"
        );
        bin.clear();
        assert_eq!(soft.live_textures(), 0, "clear deletes on the owner thread");
    }
}
