//! Wire types.
//!
//! Cursor data ([`Batch`], [`PositionSample`], [`Anchor`]) plus the JSON
//! envelope spoken between [`WsTransport`](crate::transport::WsTransport)
//! and [`RelayServer`](crate::transport::RelayServer).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Relay | Attach, presence, publish |
//! | `Response` | Relay → Client | Command result |
//! | `Event` | Relay → Client | Batches and presence changes from others |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `batch` | Samples, anchors, batches, presence metadata |
//! | `command` | Command definitions |
//! | `event` | Event types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Samples, anchors, batches and presence metadata.
pub mod batch;

/// Relay command definitions.
pub mod command;

/// Relay push frames.
pub mod event;

/// Relay call envelopes.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use batch::{Anchor, Batch, IdSource, PositionSample, PresenceMeta};
pub use command::Command;
pub use event::{Event, ParsedEvent, Push};
pub use request::{INVALID_ARGUMENT, PROTOCOL_ERROR, Request, Response, Status, UNKNOWN_ERROR};
