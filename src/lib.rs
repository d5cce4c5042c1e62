//! Cursor Sync - live shared cursors that survive different layouts.
//!
//! Participants viewing the same page see each other's pointers. Positions
//! are sent relative to page elements rather than raw pixels, so a cursor
//! hovering a paragraph on a wide screen lands on the same paragraph on a
//! narrow one.
//!
//! # Architecture
//!
//! ```text
//!  pointer ─► resolve ─► SampleEncoder ─► Transport ─► Reconstructor ─► locate ─► renderer
//!            (anchor)     (batching)     (pub/sub)     (timed replay)   (anchor)
//! ```
//!
//! Key design principles:
//!
//! - Each enabled [`SessionController`] owns one event loop task
//! - Encoder and reconstructor are clock-free state machines
//! - Batches replay with their original intra-batch timing
//! - Unresolvable anchors fall back to raw page coordinates
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cursor_sync::{
//!     CommandLog, LocalHub, MemoryDocument, ParticipantId, PointerMove, Result,
//!     SessionConfig, SessionController, SessionKey,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let page = "https://example.com/board";
//!     let config = SessionConfig::new().with_name("Ada");
//!     let participant = ParticipantId::generate();
//!     let key = SessionKey::for_page(page, &config.space)?;
//!     let hub = LocalHub::new();
//!
//!     let mut session = SessionController::builder()
//!         .page_url(page)
//!         .config(config)
//!         .participant_id(participant.clone())
//!         .transport(Arc::new(hub.connect(key, participant)))
//!         .document(Arc::new(MemoryDocument::new(1280.0, 800.0)))
//!         .renderer(CommandLog::new())
//!         .build()?;
//!
//!     session.toggle_cursor_sharing().await?;
//!     session.pointer_move(PointerMove::unscrolled(120.0, 48.0));
//!     session.toggle_cursor_sharing().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`anchor`] | Pointer ↔ element-relative position |
//! | [`capture`] | Local pointer batching |
//! | [`color`] | Cursor colors |
//! | [`dom`] | Document abstraction and in-memory tree |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`geometry`] | Points, offsets, rectangles |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`playback`] | Remote cursor reconstruction |
//! | [`protocol`] | Batch and wire message types |
//! | [`render`] | Renderer boundary |
//! | [`session`] | Session lifecycle |
//! | [`transport`] | Pub/sub adapters |

// ============================================================================
// Modules
// ============================================================================

/// Anchor resolution.
///
/// [`resolve`](anchor::resolve) describes a pointer position relative to the
/// element under it; [`locate`](anchor::locate) maps it back.
pub mod anchor;

/// Local pointer capture and batching.
pub mod capture;

/// Cursor colors.
pub mod color;

/// Document abstraction.
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Geometry primitives.
pub mod geometry;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Remote cursor playback.
pub mod playback;

/// Batch format and relay wire messages.
pub mod protocol;

/// Renderer boundary.
pub mod render;

/// Session lifecycle.
///
/// Use [`SessionController::builder()`] to create a session.
pub mod session;

/// Pub/sub transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Anchor types
pub use anchor::{ElementPath, Located, ResolvedPosition, locate, resolve};

// Capture types
pub use capture::{BatchPolicy, PointerMove, SampleEncoder};

// Geometry & color
pub use color::Rgb;
pub use geometry::{Offset, Point, Rect};

// Document types
pub use dom::{Document, ElementSpec, MemoryDocument, NodeHandle};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ParticipantId, RequestId, SessionKey};

// Playback types
pub use playback::{AnchorState, BatchOutcome, Reconstructor, RemoteCursor};

// Protocol types
pub use protocol::{Anchor, Batch, IdSource, PositionSample, PresenceMeta};

// Render types
pub use render::{CommandLog, CursorRenderer, PositionUpdate, RenderCommand};

// Session types
pub use session::{Session, SessionBuilder, SessionConfig, SessionController};

// Transport types
pub use transport::{HubTransport, LocalHub, RelayServer, Transport, TransportEvent, WsTransport};
