// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer identity across the process boundary.
//!
//! The content side allocates [`LayerId`]s from a [`LayerAllocator`] and names
//! layers by id in every message. The compositor mirrors the slot table, so
//! a message carrying a destroyed layer's id (stale generation) can be
//! recognized and dropped on arrival.

use alloc::vec::Vec;
use core::fmt;

/// A handle to a layer.
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a layer is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId {
    /// Slot index.
    pub(crate) idx: u32,
    /// Generation counter; must match the slot's generation.
    pub(crate) generation: u32,
}

impl LayerId {
    /// Reassembles a handle from its parts, as read off the wire.
    #[inline]
    #[must_use]
    pub const fn from_raw(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({}@gen{})", self.idx, self.generation)
    }
}

/// Hands out [`LayerId`]s, reusing freed slots under a new generation.
#[derive(Debug, Default)]
pub struct LayerAllocator {
    generation: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
}

impl LayerAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a handle.
    pub fn allocate(&mut self) -> LayerId {
        if let Some(idx) = self.free_list.pop() {
            let slot = idx as usize;
            self.generation[slot] = self.generation[slot].wrapping_add(1);
            self.alive[slot] = true;
            return LayerId {
                idx,
                generation: self.generation[slot],
            };
        }
        let idx = u32::try_from(self.generation.len()).unwrap_or(u32::MAX);
        assert!(idx != u32::MAX, "layer slot space exhausted");
        self.generation.push(0);
        self.alive.push(true);
        LayerId { idx, generation: 0 }
    }

    /// Frees a handle. Returns `false` if it was already stale.
    pub fn free(&mut self, id: LayerId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.alive[id.idx as usize] = false;
        self.free_list.push(id.idx);
        true
    }

    /// Returns `true` if `id` names a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        let slot = id.idx as usize;
        slot < self.generation.len() && self.alive[slot] && self.generation[slot] == id.generation
    }

    /// Number of live layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Returns `true` if no layer is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_slot_bumps_generation() {
        let mut a = LayerAllocator::new();
        let first = a.allocate();
        assert!(a.free(first), "first free succeeds");
        let second = a.allocate();
        assert_eq!(first.index(), second.index(), "slot is reused");
        assert_ne!(first, second, "generation differs");
        assert!(!a.is_alive(first), "old handle is stale");
        assert!(a.is_alive(second), "new handle is live");
    }

    #[test]
    fn double_free_is_rejected() {
        let mut a = LayerAllocator::new();
        let id = a.allocate();
        assert!(a.free(id), "first free succeeds");
        assert!(!a.free(id), "second free is a no-op");
        assert!(a.is_empty(), "nothing live");
    }

    #[test]
    fn unknown_index_is_not_alive() {
        let a = LayerAllocator::new();
        assert!(
            !a.is_alive(LayerId::from_raw(7, 0)),
            "never-allocated slot"
        );
    }
}
