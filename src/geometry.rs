//! Page geometry primitives.
//!
//! All coordinates are CSS pixels. [`Rect`]s reported by a
//! [`Document`](crate::dom::Document) are page-relative (viewport box plus
//! scroll offset).

use serde::{Deserialize, Serialize};

// ============================================================================
// Point
// ============================================================================

/// A 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if both coordinates are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ============================================================================
// Offset
// ============================================================================

/// Position inside a box as a fraction of its width and height.
///
/// Nominally `0.0..=1.0` per axis. Capture does not clamp: fast movement can
/// produce values slightly outside the box, and consumers clamp with
/// [`Offset::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    /// Horizontal fraction.
    pub x: f64,
    /// Vertical fraction.
    pub y: f64,
}

impl Offset {
    /// Creates an offset.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the offset with both axes clamped to `0.0..=1.0`.
    ///
    /// Non-finite components become `0.0`.
    #[must_use]
    pub fn clamped(self) -> Self {
        fn clamp(v: f64) -> f64 {
            if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
        }
        Self::new(clamp(self.x), clamp(self.y))
    }
}

// ============================================================================
// Rect
// ============================================================================

/// An axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width (non-negative).
    pub width: f64,
    /// Height (non-negative).
    pub height: f64,
}

impl Rect {
    /// Creates a rect.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `true` if the point lies inside the box (edges inclusive).
    #[inline]
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Expresses `point` as a fraction of this box.
    ///
    /// A zero-sized axis yields `0.0` on that axis.
    #[must_use]
    pub fn offset_of(&self, point: Point) -> Offset {
        fn fraction(delta: f64, size: f64) -> f64 {
            if size > 0.0 && size.is_finite() {
                delta / size
            } else {
                0.0
            }
        }
        Offset::new(
            fraction(point.x - self.x, self.width),
            fraction(point.y - self.y, self.height),
        )
    }

    /// Maps a fraction back to a point, clamping it into the box first.
    #[must_use]
    pub fn point_at(&self, offset: Offset) -> Point {
        let offset = offset.clamped();
        Point::new(
            self.x + offset.x * self.width,
            self.y + offset.y * self.height,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
