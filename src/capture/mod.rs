//! Local pointer capture.
//!
//! [`PointerMove`] is what the host feeds in; [`SampleEncoder`] turns a
//! stream of resolved positions into [`Batch`](crate::protocol::Batch)es.

// ============================================================================
// Submodules
// ============================================================================

/// Sample batching.
pub mod encoder;

// ============================================================================
// Imports
// ============================================================================

use crate::geometry::Point;

// ============================================================================
// Re-exports
// ============================================================================

pub use encoder::{
    BatchPolicy, DEFAULT_BATCH_INTERVAL_MS, DEFAULT_BATCH_SIZE_LIMIT, EncoderStats,
    SampleEncoder,
};

// ============================================================================
// PointerMove
// ============================================================================

/// A raw pointer-move event from the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMove {
    /// Position relative to the viewport (`clientX`/`clientY`).
    pub viewport: Point,
    /// Position relative to the page (`pageX`/`pageY`).
    pub page: Point,
}

impl PointerMove {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub const fn new(viewport: Point, page: Point) -> Self {
        Self { viewport, page }
    }

    /// Creates an event for an unscrolled page, where both coordinates match.
    #[inline]
    #[must_use]
    pub const fn unscrolled(x: f64, y: f64) -> Self {
        let point = Point::new(x, y);
        Self {
            viewport: point,
            page: point,
        }
    }
}
