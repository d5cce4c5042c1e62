//! Error types for cursor-sync.
//!
//! Lifecycle calls and transport adapters return [`Result<T>`]. Capture and
//! playback themselves never fail:
//!
//! - An anchor that no longer resolves falls back to the sender's page point
//! - A batch or timer for a participant that already left is skipped
//! - A failed publish is logged and the next window sends a fresh batch
//!
//! ```no_run
//! use cursor_sync::{Error, Result, SessionController};
//!
//! async fn share(controller: &mut SessionController) -> Result<()> {
//!     match controller.enable().await {
//!         Err(e) if e.is_config_error() => Err(e),
//!         Err(e) if e.is_transport_error() => Err(Error::transport(format!("offline: {e}"))),
//!         other => other,
//!     }
//! }
//! ```
//!
//! | Kind | Variants |
//! |------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Transport`], [`Error::TransportTimeout`], [`Error::ConnectionClosed`], [`Error::SessionClosed`] |
//! | Relay protocol | [`Error::Protocol`], [`Error::RequestTimeout`] |
//! | Wrapped | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Shorthand for results carrying [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Everything that can go wrong outside capture and playback.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Rejected by `SessionBuilder::build` or `enable`: zero batch
    /// thresholds, an empty space, or an unparseable page URL.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Publish, subscribe or presence call failed.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// Transport did not answer in time.
    #[error("Transport timeout after {timeout_ms}ms")]
    TransportTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection to the relay closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session event loop is no longer running.
    #[error("Session closed")]
    SessionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The relay refused a call, or a frame made no sense.
    #[error("Protocol error: {message}")]
    Protocol {
        /// What the relay or client objected to.
        message: String,
    },

    /// No relay reply within the request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Call that went unanswered.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// Socket bind or accept failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// A frame failed to encode or decode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket handshake or frame error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Bad page or relay URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A reply channel dropped before answering.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a transport timeout error.
    #[inline]
    pub fn transport_timeout(timeout_ms: u64) -> Self {
        Self::TransportTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Something waited too long.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::TransportTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the configuration was rejected.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns `true` if the failure came from the transport layer.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::TransportTimeout { .. }
                | Self::ConnectionClosed
                | Self::RequestTimeout { .. }
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if a later attempt may succeed.
    ///
    /// Transport failures are transient: the next flush cycle sends a fresh
    /// batch, so nothing is retried explicitly.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::TransportTimeout { .. } | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
