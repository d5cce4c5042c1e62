//! Anchor resolution.
//!
//! Turns a pointer position into a portable [`Anchor`](crate::protocol::Anchor)
//! on the sender, and an anchor back into page coordinates on the receiver.
//!
//! # Strategy
//!
//! | Hit element | Anchor |
//! |-------------|--------|
//! | has `id` or `data-cursor-anchor` | `ElementIdOffset` |
//! | anything else | `ElementPath` (`#id > tag[n] > ...`) |
//! | nothing (outside the document) | `None` |
//!
//! Page coordinates always travel alongside and are used verbatim whenever
//! the anchor cannot be resolved on the receiving side.

// ============================================================================
// Submodules
// ============================================================================

/// Structural element paths.
pub mod path;

/// `resolve` and `locate`.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use path::{ElementPath, PathSegment};
pub use resolver::{Located, ResolvedPosition, locate, resolve};
