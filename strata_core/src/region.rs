// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer regions: sets of pixels stored as non-overlapping rectangles.
//!
//! Regions describe valid, visible and updated areas of a layer. The
//! representation is a flat list of disjoint rectangles; operations keep that
//! invariant but do not coalesce, so two regions covering the same pixels may
//! hold different rectangle lists. Equality compares the covered pixel sets.

use alloc::vec::Vec;
use core::fmt;

use crate::geometry::{IntPoint, IntRect};

/// A set of pixels made of disjoint rectangles.
#[derive(Clone, Default)]
pub struct IntRegion {
    rects: Vec<IntRect>,
}

impl IntRegion {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering exactly `rect`.
    #[must_use]
    pub fn from_rect(rect: IntRect) -> Self {
        let mut rects = Vec::new();
        if !rect.is_empty() {
            rects.push(rect);
        }
        Self { rects }
    }

    /// Returns `true` if the region covers no pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The disjoint rectangles making up the region.
    #[inline]
    #[must_use]
    pub fn rects(&self) -> &[IntRect] {
        &self.rects
    }

    /// The smallest rectangle covering the region.
    #[must_use]
    pub fn bounds(&self) -> IntRect {
        self.rects
            .iter()
            .fold(IntRect::EMPTY, |acc, r| acc.union(r))
    }

    /// Number of pixels covered.
    #[must_use]
    pub fn area(&self) -> usize {
        self.rects.iter().map(|r| r.size().area()).sum()
    }

    /// Returns `true` if every pixel of `rect` is in the region.
    #[must_use]
    pub fn contains_rect(&self, rect: &IntRect) -> bool {
        let mut rest = Self::from_rect(*rect);
        rest.subtract_region(self);
        rest.is_empty()
    }

    /// Returns `true` if `point` is in the region.
    #[must_use]
    pub fn contains_point(&self, point: IntPoint) -> bool {
        self.rects.iter().any(|r| r.contains_point(point))
    }

    /// Returns `true` if the region shares a pixel with `rect`.
    #[must_use]
    pub fn intersects_rect(&self, rect: &IntRect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    // -- In-place set operations --

    /// Adds `rect` to the region.
    pub fn union_rect(&mut self, rect: IntRect) {
        if rect.is_empty() {
            return;
        }
        let mut pieces = Vec::new();
        pieces.push(rect);
        for existing in &self.rects {
            pieces = pieces
                .into_iter()
                .flat_map(|p| subtract(p, *existing))
                .collect();
            if pieces.is_empty() {
                return;
            }
        }
        self.rects.extend(pieces);
    }

    /// Adds every pixel of `other` to the region.
    pub fn union_region(&mut self, other: &Self) {
        for r in &other.rects {
            self.union_rect(*r);
        }
    }

    /// Removes `rect` from the region.
    pub fn subtract_rect(&mut self, rect: IntRect) {
        if rect.is_empty() || self.rects.is_empty() {
            return;
        }
        self.rects = self
            .rects
            .iter()
            .flat_map(|r| subtract(*r, rect))
            .collect();
    }

    /// Removes every pixel of `other` from the region.
    pub fn subtract_region(&mut self, other: &Self) {
        for r in &other.rects {
            self.subtract_rect(*r);
        }
    }

    /// Restricts the region to `rect`.
    pub fn intersect_rect(&mut self, rect: IntRect) {
        self.rects = self
            .rects
            .iter()
            .map(|r| r.intersect(&rect))
            .filter(|r| !r.is_empty())
            .collect();
    }

    /// Restricts the region to the pixels also in `other`.
    pub fn intersect_region(&mut self, other: &Self) {
        let mut out = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                let i = a.intersect(b);
                if !i.is_empty() {
                    out.push(i);
                }
            }
        }
        self.rects = out;
    }

    /// Moves the region by `offset`.
    pub fn translate(&mut self, offset: IntPoint) {
        for r in &mut self.rects {
            *r = r.translate(offset);
        }
    }

    /// Empties the region.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    // -- Value-returning variants --

    /// Returns `self ∪ other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.union_region(other);
        out
    }

    /// Returns `self − other`.
    #[must_use]
    pub fn subtracted(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.subtract_region(other);
        out
    }

    /// Returns `self ∩ other`.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.intersect_region(other);
        out
    }

    /// Returns the region moved by `offset`.
    #[must_use]
    pub fn translated(&self, offset: IntPoint) -> Self {
        let mut out = self.clone();
        out.translate(offset);
        out
    }
}

/// Returns `a − b` as up to four disjoint rectangles.
fn subtract(a: IntRect, b: IntRect) -> impl Iterator<Item = IntRect> {
    let i = a.intersect(&b);
    let pieces: [IntRect; 4] = if i.is_empty() {
        [a, IntRect::EMPTY, IntRect::EMPTY, IntRect::EMPTY]
    } else {
        [
            // Full-width band above the cut.
            IntRect::from_edges(a.x, a.y, a.right(), i.y),
            // Full-width band below the cut.
            IntRect::from_edges(a.x, i.bottom(), a.right(), a.bottom()),
            // Left and right of the cut, within its rows.
            IntRect::from_edges(a.x, i.y, i.x, i.bottom()),
            IntRect::from_edges(i.right(), i.y, a.right(), i.bottom()),
        ]
    };
    pieces.into_iter().filter(|r| !r.is_empty())
}

impl From<IntRect> for IntRegion {
    fn from(rect: IntRect) -> Self {
        Self::from_rect(rect)
    }
}

impl PartialEq for IntRegion {
    fn eq(&self, other: &Self) -> bool {
        self.area() == other.area() && self.subtracted(other).is_empty()
    }
}

impl Eq for IntRegion {}

impl fmt::Debug for IntRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.rects.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> IntRect {
        IntRect::new(x, y, w, h)
    }

    #[test]
    fn union_overlapping_rects_has_no_double_count() {
        let mut r = IntRegion::from_rect(rect(0, 0, 10, 10));
        r.union_rect(rect(5, 5, 10, 10));
        assert_eq!(r.area(), 100 + 100 - 25, "overlap counted once");
        assert_eq!(r.bounds(), rect(0, 0, 15, 15), "bounds cover both");
    }

    #[test]
    fn subtract_hole() {
        let mut r = IntRegion::from_rect(rect(0, 0, 10, 10));
        r.subtract_rect(rect(2, 2, 6, 6));
        assert_eq!(r.area(), 100 - 36, "hole removed");
        assert!(!r.contains_point(IntPoint::new(5, 5)), "center is gone");
        assert!(r.contains_point(IntPoint::new(0, 0)), "corner remains");
    }

    #[test]
    fn equality_ignores_decomposition() {
        let mut a = IntRegion::from_rect(rect(0, 0, 10, 5));
        a.union_rect(rect(0, 5, 10, 5));
        let b = IntRegion::from_rect(rect(0, 0, 10, 10));
        assert_eq!(a, b, "same pixels, different rect lists");
    }

    #[test]
    fn intersect_region() {
        let a = IntRegion::from_rect(rect(0, 0, 10, 10));
        let b = IntRegion::from_rect(rect(5, 0, 10, 10));
        assert_eq!(
            a.intersection(&b),
            IntRegion::from_rect(rect(5, 0, 5, 10)),
            "intersection is the shared half"
        );
    }

    #[test]
    fn contains_rect_across_pieces() {
        let mut r = IntRegion::from_rect(rect(0, 0, 5, 10));
        r.union_rect(rect(5, 0, 5, 10));
        assert!(
            r.contains_rect(&rect(2, 2, 6, 6)),
            "rect spanning two pieces is contained"
        );
        assert!(!r.contains_rect(&rect(8, 8, 6, 6)), "overhang is not contained");
    }

    #[test]
    fn empty_rect_is_ignored() {
        let mut r = IntRegion::new();
        r.union_rect(IntRect::EMPTY);
        assert!(r.is_empty(), "empty rect adds nothing");
    }
}
