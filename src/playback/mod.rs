//! Remote cursor playback.
//!
//! [`Reconstructor`] tracks remote participants and schedules their samples
//! on a [`Timeline`]; the caller advances it with the current local time.

// ============================================================================
// Submodules
// ============================================================================

/// Remote cursor state and batch ordering.
pub mod reconstructor;
/// Deadline queue.
pub mod timeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use reconstructor::{AnchorState, BatchOutcome, Reconstructor, RemoteCursor};
pub use timeline::{ScheduledUpdate, Timeline};
