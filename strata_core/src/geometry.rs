// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer geometry for buffers and layer-space regions.
//!
//! Buffers are addressed in whole pixels, so the transport layer works with
//! integer points, sizes and rectangles. Conversions to [`kurbo`] types are
//! provided for the compositor, which rasterizes in floating point.

use core::fmt;

use kurbo::{Point, Rect, Vec2};

/// An integer point (or offset) in pixels.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntPoint {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl IntPoint {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to a floating-point [`Point`].
    #[inline]
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// Converts to a floating-point [`Vec2`].
    #[inline]
    #[must_use]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }
}

impl core::ops::Add for IntPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl core::ops::Sub for IntPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl core::ops::Neg for IntPoint {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for IntPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An integer size in pixels.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntSize {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl IntSize {
    /// The zero size.
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero or negative.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Returns the pixel count, or zero for an empty size.
    #[inline]
    #[must_use]
    pub fn area(self) -> usize {
        if self.is_empty() {
            return 0;
        }
        dim(self.width) * dim(self.height)
    }
}

impl fmt::Debug for IntSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Converts a non-negative dimension to `usize`, clamping negatives to zero.
#[inline]
#[must_use]
pub fn dim(v: i32) -> usize {
    usize::try_from(v).unwrap_or(0)
}

/// An axis-aligned integer rectangle (origin plus size).
///
/// A rectangle with a zero or negative dimension is empty. Empty rectangles
/// compare by value like any other, but set-like operations treat all empty
/// rectangles alike.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl IntRect {
    /// The empty rectangle at the origin.
    pub const EMPTY: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    /// Creates a rectangle from origin and size components.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(size: IntSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Creates a rectangle from an origin and a size.
    #[inline]
    #[must_use]
    pub const fn from_origin_size(origin: IntPoint, size: IntSize) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Creates a rectangle from its edges. Returns an empty rectangle if the
    /// edges are inverted.
    #[inline]
    #[must_use]
    pub const fn from_edges(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        if x1 <= x0 || y1 <= y0 {
            return Self::EMPTY;
        }
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Top-left corner.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> IntPoint {
        IntPoint::new(self.x, self.y)
    }

    /// Size of the rectangle.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Returns `true` if the pixel at `p` lies inside.
    #[inline]
    #[must_use]
    pub const fn contains_point(&self, p: IntPoint) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Returns `true` if `other` lies entirely inside. Empty rectangles are
    /// contained in everything.
    #[inline]
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    /// Returns the overlap of two rectangles (possibly empty).
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self::from_edges(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        )
    }

    /// Returns `true` if the two rectangles share at least one pixel.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Returns the smallest rectangle containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Returns the rectangle moved by `offset`.
    #[inline]
    #[must_use]
    pub const fn translate(&self, offset: IntPoint) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }

    /// Converts to a floating-point [`Rect`].
    #[inline]
    #[must_use]
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.right()),
            f64::from(self.bottom()),
        )
    }

    /// Returns the smallest integer rectangle covering `rect`.
    #[must_use]
    pub fn round_out(rect: Rect) -> Self {
        let r = rect.expand();
        #[expect(
            clippy::cast_possible_truncation,
            reason = "layer-space coordinates fit comfortably in i32"
        )]
        Self::from_edges(r.x0 as i32, r.y0 as i32, r.x1 as i32, r.y1 as i32)
    }
}

impl fmt::Debug for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntRect({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}
