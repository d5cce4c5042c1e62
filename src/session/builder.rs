//! Builder pattern for session configuration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use cursor_sync::{
//!     CommandLog, LocalHub, MemoryDocument, ParticipantId, SessionConfig, SessionController,
//!     SessionKey,
//! };
//!
//! # fn example() -> cursor_sync::Result<()> {
//! let page = "https://example.com/docs#intro";
//! let config = SessionConfig::new().with_name("Ada");
//! let participant = ParticipantId::generate();
//!
//! let hub = LocalHub::new();
//! let key = SessionKey::for_page(page, &config.space)?;
//!
//! let controller = SessionController::builder()
//!     .page_url(page)
//!     .config(config)
//!     .participant_id(participant.clone())
//!     .transport(Arc::new(hub.connect(key, participant)))
//!     .document(Arc::new(MemoryDocument::new(1280.0, 800.0)))
//!     .renderer(CommandLog::new())
//!     .build()?;
//!
//! assert!(!controller.is_enabled());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::dom::Document;
use crate::error::{Error, Result};
use crate::identifiers::{ParticipantId, SessionKey};
use crate::render::CursorRenderer;
use crate::transport::Transport;

use super::config::SessionConfig;
use super::controller::SessionController;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`SessionController`].
///
/// Use [`SessionController::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    /// Page the session is scoped to.
    page_url: Option<String>,
    /// Tunables.
    config: SessionConfig,
    /// Local identity; generated when unset.
    participant_id: Option<ParticipantId>,
    /// Pub/sub adapter.
    transport: Option<Arc<dyn Transport>>,
    /// Live document for anchoring.
    document: Option<Arc<dyn Document>>,
    /// Remote cursor sink.
    renderer: Option<Box<dyn CursorRenderer>>,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default configuration and nothing attached.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page URL; its fragment is ignored when deriving the session key.
    #[inline]
    #[must_use]
    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    /// Replaces the configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Fixes the local participant id.
    ///
    /// Must match the identity the transport was created for.
    #[inline]
    #[must_use]
    pub fn participant_id(mut self, participant_id: ParticipantId) -> Self {
        self.participant_id = Some(participant_id);
        self
    }

    /// Sets the transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the document used for anchoring.
    #[inline]
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Sets the renderer for remote cursors.
    #[inline]
    #[must_use]
    pub fn renderer(mut self, renderer: impl CursorRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Validates and builds the controller. The session starts disabled.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the configuration is invalid, the page URL is
    /// missing or unparseable, or no transport, document or renderer was set.
    pub fn build(self) -> Result<SessionController> {
        self.config.validate()?;
        let session_key = self.validate_page_url()?;

        let transport = self.transport.ok_or_else(|| {
            Error::config("Transport is required. Use .transport() to set it.")
        })?;
        let document = self.document.ok_or_else(|| {
            Error::config("Document is required. Use .document() to set it.")
        })?;
        let renderer = self.renderer.ok_or_else(|| {
            Error::config("Renderer is required. Use .renderer() to set it.")
        })?;

        let participant_id = self.participant_id.unwrap_or_else(ParticipantId::generate);

        Ok(SessionController::new(
            self.config,
            session_key,
            participant_id,
            transport,
            document,
            renderer,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Derives the session key from the page URL.
    fn validate_page_url(&self) -> Result<SessionKey> {
        let url = self.page_url.as_deref().ok_or_else(|| {
            Error::config(
                "Page URL is required. Use .page_url() to set it.\n\
                 Example: SessionController::builder().page_url(\"https://example.com/\")",
            )
        })?;

        SessionKey::for_page(url, &self.config.space).map_err(|e| match e {
            Error::Url(parse) => Error::config(format!("Invalid page URL {url:?}: {parse}")),
            other => other,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
