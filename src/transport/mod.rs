//! Pub/sub and presence transport.
//!
//! A session talks to its peers only through the [`Transport`] trait. Delivery
//! is assumed at-least-once and unordered; the reconstructor copes with both.
//!
//! # Adapters
//!
//! ```text
//! ┌────────────────┐                         ┌────────────────┐
//! │  Session A     │       HubTransport      │  Session B     │
//! │                │◄───── LocalHub ────────►│                │
//! └────────────────┘      (in-process)       └────────────────┘
//!
//! ┌────────────────┐   WebSocket   ┌─────────────┐   WebSocket   ┌────────────┐
//! │  WsTransport   │◄─────────────►│ RelayServer │◄─────────────►│ WsTransport│
//! └────────────────┘               └─────────────┘               └────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `hub` | In-process rooms for embedding and tests |
//! | `relay` | WebSocket relay server |
//! | `websocket` | WebSocket client transport |

// ============================================================================
// Submodules
// ============================================================================

/// In-process pub/sub hub.
pub mod hub;

/// WebSocket relay server.
pub mod relay;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::ParticipantId;
use crate::protocol::{Batch, PresenceMeta};

// ============================================================================
// Re-exports
// ============================================================================

pub use hub::{HubTransport, LocalHub};
pub use relay::RelayServer;
pub use websocket::WsTransport;

// ============================================================================
// TransportEvent
// ============================================================================

/// Something another participant did.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A batch was published.
    Batch(Batch),
    /// A participant entered.
    Joined(PresenceMeta),
    /// A participant left.
    Left(ParticipantId),
}

// ============================================================================
// Transport
// ============================================================================

/// Connection to the other participants of one session.
///
/// Implementations never echo a participant's own events back to it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcasts a batch to the other participants.
    async fn publish(&self, batch: &Batch) -> Result<()>;

    /// Announces local presence.
    async fn enter(&self, meta: PresenceMeta) -> Result<()>;

    /// Withdraws local presence.
    async fn leave(&self) -> Result<()>;

    /// Lists participants currently present, possibly including the caller.
    async fn presence(&self) -> Result<Vec<PresenceMeta>>;

    /// Starts receiving events.
    ///
    /// A new subscription replaces the previous one.
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>>;
}
